/// Errors returned by public client calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The client is closed, never opened, or gave up reconnecting.
    #[error("Not connected to server")]
    NotConnected,

    /// Socket setup or the request handoff failed.
    #[error(transparent)]
    Transport(#[from] proplink_transport::TransportError),

    /// A response arrived but could not be decoded.
    #[error(transparent)]
    Wire(#[from] proplink_wire::WireError),

    /// The request completed with an error response, either sent by the
    /// server in-band or synthesized by the reconnect controller.
    #[error("{0}")]
    ErrorResponse(String),

    /// The I/O thread could not be spawned.
    #[error("failed to spawn I/O thread: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
