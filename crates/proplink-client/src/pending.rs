use std::collections::HashMap;
use std::time::Instant;

use bytes::Bytes;
use crossbeam::channel::Sender;
use proplink_transport::PushQueue;
use proplink_wire::decode_info_payload;

/// Completion of a `set_variable`/`execute_trigger` request, delivered to
/// the blocking caller and/or the completion callback.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub command_id: u32,
    pub success: bool,
    /// The server's info or error message, or the reconnect controller's
    /// synthesized reason on transport failure.
    pub message: String,
}

/// A correlated reply before shape decoding: the raw success payload, or
/// an error message.
#[derive(Debug)]
pub(crate) struct RawReply {
    pub command_id: u32,
    pub result: std::result::Result<Bytes, String>,
}

impl CommandResult {
    pub(crate) fn from_raw(raw: RawReply) -> Self {
        match raw.result {
            Ok(payload) => match decode_info_payload(&payload) {
                Ok(message) => CommandResult {
                    command_id: raw.command_id,
                    success: true,
                    message: message.unwrap_or_default(),
                },
                Err(error) => CommandResult {
                    command_id: raw.command_id,
                    success: false,
                    message: format!("Malformed response payload: {error}"),
                },
            },
            Err(message) => CommandResult {
                command_id: raw.command_id,
                success: false,
                message,
            },
        }
    }
}

/// How a reply reaches the caller: a single-shot channel for sync requests
/// or a boxed callback for async ones.
pub(crate) enum Completer {
    Channel(Sender<RawReply>),
    Callback(Box<dyn FnOnce(RawReply) + Send>),
}

impl Completer {
    pub fn complete(self, reply: RawReply) {
        match self {
            // The receiver may be gone if the caller gave up; that's fine.
            Completer::Channel(tx) => {
                let _ = tx.send(reply);
            }
            Completer::Callback(callback) => callback(reply),
        }
    }
}

/// One registered correlation entry: lives from submission until
/// completed, timed out, or cancelled by reconnect.
pub(crate) struct PendingEntry {
    pub completer: Completer,
    pub deadline: Option<Instant>,
}

/// The client's send side: the inproc handoff queue to the I/O thread plus
/// the correlation map, guarded together by one mutex.
pub(crate) struct SendState {
    pub queue: PushQueue,
    pub pending: HashMap<u32, PendingEntry>,
}

impl SendState {
    pub fn new(queue: PushQueue) -> Self {
        Self {
            queue,
            pending: HashMap::new(),
        }
    }

    pub fn drain(&mut self) -> Vec<(u32, Completer)> {
        self.pending
            .drain()
            .map(|(id, entry)| (id, entry.completer))
            .collect()
    }
}
