use std::sync::{Mutex, PoisonError};

use bytes::BytesMut;
use proplink_transport::Publisher;
use proplink_wire::{encode_message, Message, Variable};
use tracing::warn;

/// Publishes `VariableUpdate` frames on the notification channel.
///
/// Holds no publishers while the server is stopped, so server-side writes
/// before `start` or after `stop` update state silently. Delivery is
/// best-effort: send failures are logged and dropped. The single mutex
/// serializes the send path, which is what preserves per-variable
/// notification order (callers publish while still holding the variables
/// lock).
pub(crate) struct Notifier {
    sinks: Mutex<Vec<Publisher>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            sinks: Mutex::new(Vec::new()),
        }
    }

    /// Install the bound publishers; called by `start`.
    pub fn activate(&self, publishers: Vec<Publisher>) {
        *self.lock() = publishers;
    }

    /// Drop all publishers; called by `stop`.
    pub fn deactivate(&self) {
        self.lock().clear();
    }

    /// Broadcast one variable change to every bound endpoint.
    pub fn publish(&self, record: &Variable) {
        let sinks = self.lock();
        if sinks.is_empty() {
            return;
        }
        let mut frame = BytesMut::new();
        encode_message(&Message::Update(record.clone()), &mut frame);
        for sink in sinks.iter() {
            if let Err(error) = sink.publish(&frame) {
                warn!(
                    variable = %record.name,
                    endpoint = sink.endpoint(),
                    %error,
                    "failed to publish variable update"
                );
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Publisher>> {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
