use std::io;
use std::net::SocketAddr;

/// Fatal conditions that end the relay.
///
/// Recoverable failures (accept, per-client I/O, sends to the active client)
/// never surface here; the event loop logs and drops them.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Pipe allocation, process creation or exec of the child failed
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// No candidate address could be bound
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// The socket was bound but could not start listening
    #[error("failed to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The readiness mechanism itself is unusable
    #[error("readiness wait failed: {0}")]
    Wait(#[source] io::Error),

    /// Reading the operator's input stream failed
    #[error("failed to read operator input: {0}")]
    OperatorRead(#[source] io::Error),
}

impl RelayError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            RelayError::Spawn { .. } | RelayError::OperatorRead(_) => 1,
            RelayError::Bind { .. } => 2,
            RelayError::Listen { .. } => 3,
            RelayError::Wait(_) => 4,
        }
    }
}
