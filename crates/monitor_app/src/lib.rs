//! Job monitor host layer: configuration, logging setup and the
//! [`JobMonitor`] that ties the pure core to the socket engine.
pub mod config;
mod effects;
pub mod logging;
mod monitor;

pub use config::{ConfigError, MonitorConfig};
pub use effects::MonitorCallbacks;
pub use monitor::JobMonitor;
