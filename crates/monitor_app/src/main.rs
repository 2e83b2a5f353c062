use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use monitor_app::{logging, JobMonitor, MonitorCallbacks, MonitorConfig};
use monitor_core::{JobKind, MonitorViewModel, TerminalOutcome};
use monitor_logging::monitor_info;

const DEFAULT_CONFIG: &str = "monitor.ron";
const POLL_INTERVAL: Duration = Duration::from_millis(200);
const USAGE: &str = "usage: monitor_app [--config PATH] training|prediction";

#[derive(Debug, PartialEq)]
struct CliArgs {
    config: PathBuf,
    kind: JobKind,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut config = PathBuf::from(DEFAULT_CONFIG);
    let mut kind = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = args.next() else {
                    bail!("--config needs a path\n{USAGE}");
                };
                config = PathBuf::from(path);
            }
            "training" => kind = Some(JobKind::Training),
            "prediction" => kind = Some(JobKind::Prediction),
            other => bail!("unexpected argument {other:?}\n{USAGE}"),
        }
    }
    match kind {
        Some(kind) => Ok(CliArgs { config, kind }),
        None => bail!("{USAGE}"),
    }
}

fn print_snapshot(view: &MonitorViewModel) -> anyhow::Result<()> {
    let line = serde_json::json!({
        "at": Utc::now().to_rfc3339(),
        "view": view,
    });
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let config = MonitorConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    logging::initialize(config.log_destination, config.level_filter());
    monitor_info!("monitoring {:?} jobs at {}", args.kind, config.server_url);

    let mut monitor = match args.kind {
        JobKind::Prediction => JobMonitor::for_trained_model(&config),
        _ => JobMonitor::new(&config),
    };

    let outcome: Rc<RefCell<Option<TerminalOutcome>>> = Rc::default();
    let training_slot = Rc::clone(&outcome);
    let prediction_slot = Rc::clone(&outcome);
    monitor.set_callbacks(
        MonitorCallbacks::new()
            .on_connection_status_change(|status| monitor_info!("connection {:?}", status))
            .on_training_complete(move |result| {
                *training_slot.borrow_mut() = Some(result.clone());
            })
            .on_prediction_complete(move |result| {
                *prediction_slot.borrow_mut() = Some(result.clone());
            }),
    );
    monitor.set_job(args.kind);

    let mut changed = monitor.pump();
    loop {
        if changed {
            print_snapshot(&monitor.view())?;
        }
        if monitor.is_settled() {
            break;
        }
        changed = monitor.wait(POLL_INTERVAL);
    }

    let result = outcome.borrow_mut().take();
    match result {
        Some(result) if result.success => Ok(()),
        Some(result) => bail!(
            "{:?} job failed: {}",
            args.kind,
            result.error.as_deref().unwrap_or("no error given")
        ),
        None => bail!("{:?} job ended without an outcome", args.kind),
    }
}
