use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use monitor_engine::{
    ChannelError, ChannelEvent, ConnectionManager, Connector, EventSink, FrameSource,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use url::Url;

/// Connector whose sockets are fed by the test through unbounded channels.
#[derive(Default)]
struct ScriptedConnector {
    connects: AtomicUsize,
    closes: Arc<AtomicUsize>,
    servers: Mutex<Vec<UnboundedSender<String>>>,
}

impl ScriptedConnector {
    fn server(&self, index: usize) -> UnboundedSender<String> {
        self.servers.lock().unwrap()[index].clone()
    }

    /// Drops the server side of socket `index`, as if the peer hung up.
    fn hang_up(&self, index: usize) {
        let (dead, _) = unbounded_channel();
        self.servers.lock().unwrap()[index] = dead;
    }
}

struct ScriptedSource {
    rx: UnboundedReceiver<String>,
    closes: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl FrameSource for ScriptedSource {
    async fn next_frame(&mut self) -> Option<Result<String, ChannelError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn FrameSource>, ChannelError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if url.path().ends_with("refused") {
            return Err(ChannelError::Network("connection refused".to_string()));
        }
        let (tx, rx) = unbounded_channel();
        self.servers.lock().unwrap().push(tx);
        Ok(Box::new(ScriptedSource {
            rx,
            closes: self.closes.clone(),
        }))
    }
}

#[derive(Default)]
struct TestSink {
    events: Mutex<Vec<ChannelEvent>>,
}

impl TestSink {
    fn snapshot(&self) -> Vec<ChannelEvent> {
        self.events.lock().unwrap().clone()
    }

    async fn wait_for(&self, wanted: &ChannelEvent) -> Vec<ChannelEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let events = self.snapshot();
            if events.contains(wanted) {
                return events;
            }
            assert!(Instant::now() < deadline, "timed out waiting for {wanted:?}: {events:?}");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl EventSink for TestSink {
    fn emit(&self, event: ChannelEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn setup() -> (Arc<ScriptedConnector>, Arc<TestSink>, ConnectionManager) {
    let connector = Arc::new(ScriptedConnector::default());
    let sink = Arc::new(TestSink::default());
    let manager = ConnectionManager::new(
        connector.clone(),
        sink.clone(),
        tokio::runtime::Handle::current(),
    );
    (connector, sink, manager)
}

fn url(path: &str) -> Url {
    Url::parse(&format!("ws://127.0.0.1:9/ws/{path}")).unwrap()
}

fn position(events: &[ChannelEvent], wanted: &ChannelEvent) -> usize {
    events.iter().position(|e| e == wanted).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ensure_connected_twice_creates_one_socket() {
    let (connector, sink, mut manager) = setup();

    assert!(manager.ensure_connected(1, url("training-progress")));
    assert!(!manager.ensure_connected(1, url("training-progress")));
    sink.wait_for(&ChannelEvent::Opened { session: 1 }).await;
    assert!(!manager.ensure_connected(1, url("training-progress")));

    assert!(manager.is_live(1));
    assert_eq!(manager.sockets_created(), 1);
    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn grace_close_still_delivers_trailing_frames() {
    let (connector, sink, mut manager) = setup();
    manager.ensure_connected(1, url("training-progress"));
    sink.wait_for(&ChannelEvent::Opened { session: 1 }).await;
    let server = connector.server(0);

    server.send(r#"{"type":"training_completed"}"#.to_string()).unwrap();
    let grace = Duration::from_millis(200);
    let started = Instant::now();
    manager.close_after(1, grace);
    server.send(r#"{"stage":"saved"}"#.to_string()).unwrap();

    let events = sink.wait_for(&ChannelEvent::Closed { session: 1 }).await;
    assert!(started.elapsed() >= grace);
    let trailing = ChannelEvent::Frame {
        session: 1,
        text: r#"{"stage":"saved"}"#.to_string(),
    };
    assert!(position(&events, &trailing) < position(&events, &ChannelEvent::Closed { session: 1 }));
    assert_eq!(connector.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn close_now_does_not_wait_for_grace() {
    let (connector, sink, mut manager) = setup();
    manager.ensure_connected(1, url("training-progress"));
    sink.wait_for(&ChannelEvent::Opened { session: 1 }).await;

    manager.close_after(1, Duration::from_secs(60));
    manager.close_now(1);

    let started = Instant::now();
    sink.wait_for(&ChannelEvent::Closed { session: 1 }).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(connector.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_session_waits_for_previous_socket_to_close() {
    let (connector, sink, mut manager) = setup();
    manager.ensure_connected(1, url("training-progress"));
    sink.wait_for(&ChannelEvent::Opened { session: 1 }).await;

    assert!(manager.ensure_connected(2, url("evaluation-progress")));
    let events = sink.wait_for(&ChannelEvent::Opened { session: 2 }).await;

    assert!(
        position(&events, &ChannelEvent::Closed { session: 1 })
            < position(&events, &ChannelEvent::Opened { session: 2 })
    );
    assert_eq!(connector.connects.load(Ordering::SeqCst), 2);

    // Old session ids never get a socket back.
    assert!(!manager.ensure_connected(2, url("evaluation-progress")));
    manager.close_now(1);
    assert!(manager.is_live(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn peer_hang_up_reports_closed_without_failure() {
    let (connector, sink, mut manager) = setup();
    manager.ensure_connected(3, url("training-progress"));
    sink.wait_for(&ChannelEvent::Opened { session: 3 }).await;

    connector.hang_up(0);
    let events = sink.wait_for(&ChannelEvent::Closed { session: 3 }).await;

    assert!(!events
        .iter()
        .any(|e| matches!(e, ChannelEvent::Failed { .. })));
    assert_eq!(connector.closes.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connect_failure_reports_failed_then_closed() {
    let (_connector, sink, mut manager) = setup();
    manager.ensure_connected(4, url("refused"));

    let events = sink.wait_for(&ChannelEvent::Closed { session: 4 }).await;
    assert_eq!(
        events,
        vec![
            ChannelEvent::Failed {
                session: 4,
                error: ChannelError::Network("connection refused".to_string()),
            },
            ChannelEvent::Closed { session: 4 },
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_closes_open_socket() {
    let (connector, sink, mut manager) = setup();
    manager.ensure_connected(5, url("training-progress"));
    sink.wait_for(&ChannelEvent::Opened { session: 5 }).await;

    let task = manager.shutdown().expect("socket task");
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(connector.closes.load(Ordering::SeqCst), 1);
    assert_eq!(sink.snapshot().last(), Some(&ChannelEvent::Closed { session: 5 }));
    assert!(manager.shutdown().is_none());
}
