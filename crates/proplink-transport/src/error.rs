/// Errors that can occur in socket operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding a socket to an endpoint failed.
    #[error("failed to bind {role} socket at {endpoint}: {source}")]
    Bind {
        role: &'static str,
        endpoint: String,
        source: zmq::Error,
    },

    /// Connecting a socket to an endpoint failed.
    #[error("failed to connect {role} socket to {endpoint}: {source}")]
    Connect {
        role: &'static str,
        endpoint: String,
        source: zmq::Error,
    },

    /// A multipart message had the wrong number of frames.
    #[error("malformed multipart message ({frames} frames, expected {expected})")]
    Malformed { frames: usize, expected: usize },

    /// A bounded wait elapsed without the peer answering.
    #[error("{role} operation timed out")]
    Timeout { role: &'static str },

    /// Any other socket-level error.
    #[error("socket error: {0}")]
    Socket(#[from] zmq::Error),
}

impl TransportError {
    /// Whether this error is a send/receive timeout rather than a hard
    /// transport failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
            || matches!(self, TransportError::Socket(zmq::Error::EAGAIN))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
