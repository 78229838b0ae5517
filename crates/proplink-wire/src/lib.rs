//! Value model and binary message codec for the PropLink protocol.
//!
//! Every message starts with a fixed 9-byte header:
//! - 1-byte message type
//! - 4-byte little-endian message id
//! - 4-byte little-endian payload size
//!
//! followed by exactly `payload_size` payload bytes. Names travel as
//! NUL-terminated UTF-8; values as a one-byte kind discriminator plus a
//! fixed-width or length-prefixed payload.

pub mod codec;
pub mod error;
pub mod message;
pub mod value;

pub use codec::{
    decode_info_payload, decode_message, decode_trigger_list_payload, decode_variable_list_payload,
    decode_variable_payload, encode_info_payload, encode_message, encode_trigger_list_payload,
    encode_variable_list_payload, encode_variable_payload, peek_msg_id,
};
pub use error::{Result, WireError};
pub use message::{
    Command, Message, HEADER_LEN, MSG_ERROR, MSG_EXECUTE_TRIGGER, MSG_GET_ALL_TRIGGERS,
    MSG_GET_ALL_VARIABLES, MSG_GET_VARIABLE, MSG_SET_VARIABLE, MSG_SUCCESS, MSG_VARIABLE_UPDATE,
    NOTIFY_MSG_ID,
};
pub use value::{Value, ValueKind, Variable};
