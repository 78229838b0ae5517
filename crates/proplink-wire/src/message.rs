use bytes::Bytes;

use crate::value::{Value, Variable};

/// Error response (server to client).
pub const MSG_ERROR: u8 = 0;
/// Read one variable (client to server).
pub const MSG_GET_VARIABLE: u8 = 1;
/// Write one variable (client to server).
pub const MSG_SET_VARIABLE: u8 = 2;
/// Read the full variable catalog (client to server).
pub const MSG_GET_ALL_VARIABLES: u8 = 3;
/// Read the trigger catalog (client to server).
pub const MSG_GET_ALL_TRIGGERS: u8 = 4;
/// Execute a trigger by name (client to server).
pub const MSG_EXECUTE_TRIGGER: u8 = 5;
/// Variable-change notification (server to subscribers).
pub const MSG_VARIABLE_UPDATE: u8 = 6;
/// Success response (server to client).
pub const MSG_SUCCESS: u8 = 7;

/// Fixed header: msg_type (1) + msg_id (4 LE) + payload_size (4 LE).
pub const HEADER_LEN: usize = 9;

/// Notifications are not replies to anything; they carry msg_id 0.
pub const NOTIFY_MSG_ID: u32 = 0;

/// A client-to-server command body.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    GetVariable { name: String },
    SetVariable { name: String, value: Value },
    GetAllVariables,
    GetAllTriggers,
    ExecuteTrigger { name: String },
}

impl Command {
    pub fn msg_type(&self) -> u8 {
        match self {
            Command::GetVariable { .. } => MSG_GET_VARIABLE,
            Command::SetVariable { .. } => MSG_SET_VARIABLE,
            Command::GetAllVariables => MSG_GET_ALL_VARIABLES,
            Command::GetAllTriggers => MSG_GET_ALL_TRIGGERS,
            Command::ExecuteTrigger { .. } => MSG_EXECUTE_TRIGGER,
        }
    }

    /// Command name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetVariable { .. } => "GetVariable",
            Command::SetVariable { .. } => "SetVariable",
            Command::GetAllVariables => "GetAllVariables",
            Command::GetAllTriggers => "GetAllTriggers",
            Command::ExecuteTrigger { .. } => "ExecuteTrigger",
        }
    }
}

/// Any complete wire message.
///
/// Success payloads are opaque at this layer: their shape depends on the
/// command they answer, so the side that knows the originating command
/// decodes them with the payload codecs in [`crate::codec`].
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A command request carrying a per-client monotonically increasing id.
    Command { command_id: u32, command: Command },
    /// A success response; the payload shape is command-specific.
    Success { command_id: u32, payload: Bytes },
    /// An error response carrying a human-readable reason.
    Error { command_id: u32, message: String },
    /// A variable-change notification.
    Update(Variable),
}

impl Message {
    pub fn msg_type(&self) -> u8 {
        match self {
            Message::Command { command, .. } => command.msg_type(),
            Message::Success { .. } => MSG_SUCCESS,
            Message::Error { .. } => MSG_ERROR,
            Message::Update(_) => MSG_VARIABLE_UPDATE,
        }
    }

    /// The msg_id carried in the header.
    pub fn command_id(&self) -> u32 {
        match self {
            Message::Command { command_id, .. }
            | Message::Success { command_id, .. }
            | Message::Error { command_id, .. } => *command_id,
            Message::Update(_) => NOTIFY_MSG_ID,
        }
    }
}
