use crate::{JobKind, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Host re-rendered with the job it wants monitored. Repeats are no-ops.
    JobRequested(JobKind),
    /// Raw text frame received on the socket of `session`.
    Frame { session: SessionId, payload: String },
    /// Socket of `session` finished its handshake.
    ConnectionOpened { session: SessionId },
    /// Transport error on the socket of `session`.
    ConnectionFailed { session: SessionId, message: String },
    /// Socket of `session` is closed, by either side.
    ConnectionClosed { session: SessionId },
    /// Host is going away; force-close whatever is open.
    Unmount,
    /// Fallback for placeholder wiring.
    NoOp,
}
