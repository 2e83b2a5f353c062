//! Monitor engine: socket IO for the job-monitoring channel.
mod engine;
mod manager;
mod socket;
mod types;

pub use engine::ChannelHandle;
pub use manager::{ChannelEventSink, ConnectionManager, EventSink};
pub use socket::{Connector, FrameSource, WsConnector};
pub use types::{ChannelError, ChannelEvent, ChannelSettings, SessionId};
