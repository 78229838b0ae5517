/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Input ended before a complete header or field was read.
    #[error("truncated message")]
    Truncated,

    /// The header's payload size disagrees with the bytes actually present.
    #[error("declared payload size {declared} does not match body size {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// The message type byte is not one of the known kinds.
    #[error("unknown message type {code} (msg_id {msg_id})")]
    UnknownMessageType { code: u8, msg_id: u32 },

    /// The value kind byte is not one of the four known kinds.
    #[error("unknown value kind {0}")]
    UnknownValueKind(u8),

    /// A name or string field contains invalid UTF-8.
    #[error("invalid UTF-8 in {field} field")]
    InvalidUtf8 { field: &'static str },

    /// A payload decoded cleanly but left bytes behind.
    #[error("payload has {extra} trailing bytes")]
    TrailingBytes { extra: usize },
}

pub type Result<T> = std::result::Result<T, WireError>;
