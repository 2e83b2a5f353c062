use crate::{ConnectionState, Endpoint, JobKind, SessionId, TerminalOutcome};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open a socket for `session`. Never issued twice for the same session.
    Connect { session: SessionId, endpoint: Endpoint },
    /// Close the socket of `session` once the grace delay has elapsed.
    CloseAfterGrace { session: SessionId },
    /// Close the socket of `session` without waiting.
    CloseNow { session: SessionId },
    /// Forward the new transport state to the host.
    ConnectionStatusChanged(ConnectionState),
    /// A session ended; fires at most once per session.
    JobFinished {
        kind: JobKind,
        outcome: TerminalOutcome,
    },
}
