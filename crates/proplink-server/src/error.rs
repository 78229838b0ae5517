/// Errors that can occur while starting or registering on a server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Socket setup failed (bind, option, or inproc plumbing).
    #[error(transparent)]
    Transport(#[from] proplink_transport::TransportError),

    /// An OS thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },

    /// Variables and triggers must have non-empty names.
    #[error("{kind} name must not be empty")]
    EmptyName { kind: &'static str },
}

pub type Result<T> = std::result::Result<T, ServerError>;
