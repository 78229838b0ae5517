use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};
use crate::message::{
    Command, Message, HEADER_LEN, MSG_ERROR, MSG_EXECUTE_TRIGGER, MSG_GET_ALL_TRIGGERS,
    MSG_GET_ALL_VARIABLES, MSG_GET_VARIABLE, MSG_SET_VARIABLE, MSG_SUCCESS, MSG_VARIABLE_UPDATE,
};
use crate::value::{Value, ValueKind, Variable};

/// Encode a complete message (header + payload) into `dst`.
pub fn encode_message(msg: &Message, dst: &mut BytesMut) {
    let mut payload = BytesMut::new();
    match msg {
        Message::Command { command, .. } => match command {
            Command::GetVariable { name } | Command::ExecuteTrigger { name } => {
                put_str_z(&mut payload, name);
            }
            Command::SetVariable { name, value } => {
                put_str_z(&mut payload, name);
                put_value(&mut payload, value);
            }
            Command::GetAllVariables | Command::GetAllTriggers => {}
        },
        Message::Success { payload: body, .. } => payload.put_slice(body),
        Message::Error { message, .. } => put_str_z(&mut payload, message),
        Message::Update(record) => put_variable(&mut payload, record),
    }

    dst.reserve(HEADER_LEN + payload.len());
    dst.put_u8(msg.msg_type());
    dst.put_u32_le(msg.command_id());
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(&payload);
}

/// Decode one complete message from a single body frame.
///
/// The frame must contain exactly the header plus the declared payload.
pub fn decode_message(buf: &[u8]) -> Result<Message> {
    if buf.len() < HEADER_LEN {
        return Err(WireError::Truncated);
    }

    let mut cursor = buf;
    let msg_type = cursor.get_u8();
    let msg_id = cursor.get_u32_le();
    let declared = cursor.get_u32_le() as usize;
    if cursor.len() != declared {
        return Err(WireError::LengthMismatch {
            declared,
            actual: cursor.len(),
        });
    }

    let mut payload = cursor;
    let msg = match msg_type {
        MSG_GET_VARIABLE => Message::Command {
            command_id: msg_id,
            command: Command::GetVariable {
                name: get_str_z(&mut payload, "name")?,
            },
        },
        MSG_SET_VARIABLE => {
            let name = get_str_z(&mut payload, "name")?;
            let value = get_value(&mut payload)?;
            Message::Command {
                command_id: msg_id,
                command: Command::SetVariable { name, value },
            }
        }
        MSG_GET_ALL_VARIABLES => Message::Command {
            command_id: msg_id,
            command: Command::GetAllVariables,
        },
        MSG_GET_ALL_TRIGGERS => Message::Command {
            command_id: msg_id,
            command: Command::GetAllTriggers,
        },
        MSG_EXECUTE_TRIGGER => Message::Command {
            command_id: msg_id,
            command: Command::ExecuteTrigger {
                name: get_str_z(&mut payload, "name")?,
            },
        },
        MSG_SUCCESS => {
            return Ok(Message::Success {
                command_id: msg_id,
                payload: Bytes::copy_from_slice(payload),
            });
        }
        MSG_ERROR => Message::Error {
            command_id: msg_id,
            message: get_str_z(&mut payload, "error message")?,
        },
        MSG_VARIABLE_UPDATE => Message::Update(get_variable(&mut payload)?),
        code => return Err(WireError::UnknownMessageType { code, msg_id }),
    };

    finish(payload)?;
    Ok(msg)
}

/// Read the msg_id out of a frame without decoding it.
///
/// Lets the dispatch loop echo the id in an in-band error response even
/// when the payload itself fails to parse.
pub fn peek_msg_id(buf: &[u8]) -> Option<u32> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    let mut cursor = &buf[1..5];
    Some(cursor.get_u32_le())
}

/// Success payload of `GetVariable` and body of `VariableUpdate`.
pub fn encode_variable_payload(record: &Variable) -> Bytes {
    let mut buf = BytesMut::new();
    put_variable(&mut buf, record);
    buf.freeze()
}

pub fn decode_variable_payload(payload: &[u8]) -> Result<Variable> {
    let mut cursor = payload;
    let record = get_variable(&mut cursor)?;
    finish(cursor)?;
    Ok(record)
}

/// Success payload of `GetAllVariables`: count then that many records.
pub fn encode_variable_list_payload(records: &[Variable]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u32_le(records.len() as u32);
    for record in records {
        put_variable(&mut buf, record);
    }
    buf.freeze()
}

pub fn decode_variable_list_payload(payload: &[u8]) -> Result<Vec<Variable>> {
    let mut cursor = payload;
    need(cursor, 4)?;
    let count = cursor.get_u32_le() as usize;
    let mut records = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        records.push(get_variable(&mut cursor)?);
    }
    finish(cursor)?;
    Ok(records)
}

/// Success payload of `GetAllTriggers`: count then that many names.
pub fn encode_trigger_list_payload<S: AsRef<str>>(names: &[S]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u32_le(names.len() as u32);
    for name in names {
        put_str_z(&mut buf, name.as_ref());
    }
    buf.freeze()
}

pub fn decode_trigger_list_payload(payload: &[u8]) -> Result<Vec<String>> {
    let mut cursor = payload;
    need(cursor, 4)?;
    let count = cursor.get_u32_le() as usize;
    let mut names = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        names.push(get_str_z(&mut cursor, "trigger name")?);
    }
    finish(cursor)?;
    Ok(names)
}

/// Success payload of `SetVariable` and `ExecuteTrigger`: an optional
/// human-readable message.
pub fn encode_info_payload(message: Option<&str>) -> Bytes {
    match message {
        Some(message) => {
            let mut buf = BytesMut::with_capacity(message.len() + 1);
            put_str_z(&mut buf, message);
            buf.freeze()
        }
        None => Bytes::new(),
    }
}

pub fn decode_info_payload(payload: &[u8]) -> Result<Option<String>> {
    if payload.is_empty() {
        return Ok(None);
    }
    let mut cursor = payload;
    let message = get_str_z(&mut cursor, "info message")?;
    finish(cursor)?;
    Ok(Some(message))
}

fn put_str_z(dst: &mut BytesMut, s: &str) {
    dst.reserve(s.len() + 1);
    dst.put_slice(s.as_bytes());
    dst.put_u8(0);
}

fn get_str_z(buf: &mut &[u8], field: &'static str) -> Result<String> {
    let Some(pos) = buf.iter().position(|b| *b == 0) else {
        return Err(WireError::Truncated);
    };
    let s = std::str::from_utf8(&buf[..pos])
        .map_err(|_| WireError::InvalidUtf8 { field })?
        .to_string();
    buf.advance(pos + 1);
    Ok(s)
}

fn put_value(dst: &mut BytesMut, value: &Value) {
    dst.put_u8(value.kind().code());
    match value {
        Value::Float(v) => dst.put_f64_le(*v),
        Value::Bool(v) => dst.put_u8(u8::from(*v)),
        Value::Int(v) => dst.put_i64_le(*v),
        Value::Str(v) => {
            dst.put_u32_le(v.len() as u32);
            dst.put_slice(v.as_bytes());
        }
    }
}

fn get_value(buf: &mut &[u8]) -> Result<Value> {
    need(buf, 1)?;
    let code = buf.get_u8();
    let kind = ValueKind::from_code(code).ok_or(WireError::UnknownValueKind(code))?;
    match kind {
        ValueKind::Float => {
            need(buf, 8)?;
            Ok(Value::Float(buf.get_f64_le()))
        }
        ValueKind::Int => {
            need(buf, 8)?;
            Ok(Value::Int(buf.get_i64_le()))
        }
        ValueKind::Bool => {
            need(buf, 1)?;
            Ok(Value::Bool(buf.get_u8() != 0))
        }
        ValueKind::Str => {
            need(buf, 4)?;
            let len = buf.get_u32_le() as usize;
            need(buf, len)?;
            let s = std::str::from_utf8(&buf[..len])
                .map_err(|_| WireError::InvalidUtf8 { field: "string value" })?
                .to_string();
            buf.advance(len);
            Ok(Value::Str(s))
        }
    }
}

fn put_variable(dst: &mut BytesMut, record: &Variable) {
    put_str_z(dst, &record.name);
    put_value(dst, &record.value);
    dst.put_u8(u8::from(record.read_only));
}

fn get_variable(buf: &mut &[u8]) -> Result<Variable> {
    let name = get_str_z(buf, "name")?;
    let value = get_value(buf)?;
    need(buf, 1)?;
    let read_only = buf.get_u8() != 0;
    Ok(Variable {
        name,
        value,
        read_only,
    })
}

fn need(buf: &[u8], n: usize) -> Result<()> {
    if buf.len() < n {
        return Err(WireError::Truncated);
    }
    Ok(())
}

fn finish(buf: &[u8]) -> Result<()> {
    if !buf.is_empty() {
        return Err(WireError::TrailingBytes { extra: buf.len() });
    }
    Ok(())
}
