use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use bytes::Bytes;
use proplink_wire::{Value, Variable};
use tracing::debug;

use crate::pending::{Completer, PendingEntry, RawReply, SendState};

/// Invoked from the I/O thread when a subscribed variable's value changes.
pub type UpdateCallback = Arc<dyn Fn(&Value) + Send + Sync>;

pub(crate) struct CallbackSlot {
    pub callback: UpdateCallback,
    /// Last value handed to the callback; used to drop duplicate
    /// notifications. `None` until the first delivery.
    pub last_delivered: Option<Value>,
}

/// State shared between the public [`crate::Client`] handle and its I/O
/// thread.
pub(crate) struct ClientState {
    /// `Some` while the client is operating. Holds the request handoff
    /// queue and the correlation map under one mutex.
    send: Mutex<Option<SendState>>,
    callbacks: Mutex<HashMap<String, CallbackSlot>>,
    next_command_id: AtomicU32,
}

impl ClientState {
    pub fn new() -> Self {
        Self {
            send: Mutex::new(None),
            callbacks: Mutex::new(HashMap::new()),
            // 0 is the notification msg_id; start above it.
            next_command_id: AtomicU32::new(1),
        }
    }

    pub fn next_id(&self) -> u32 {
        self.next_command_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn is_open(&self) -> bool {
        self.lock_send().is_some()
    }

    pub fn install_send(&self, state: SendState) {
        *self.lock_send() = Some(state);
    }

    /// Register a correlation entry and hand the encoded command frame to
    /// the I/O thread. The entry is rolled back if the handoff fails.
    pub fn submit(
        &self,
        command_id: u32,
        frame: &[u8],
        completer: Completer,
        deadline: Option<Instant>,
    ) -> crate::error::Result<()> {
        let mut guard = self.lock_send();
        let Some(state) = guard.as_mut() else {
            return Err(crate::error::ClientError::NotConnected);
        };
        state
            .pending
            .insert(command_id, PendingEntry { completer, deadline });
        if let Err(error) = state.queue.push(&[frame]) {
            state.pending.remove(&command_id);
            if error.is_timeout() {
                // DONTWAIT push can only fail this way once the I/O thread
                // is gone.
                return Err(crate::error::ClientError::NotConnected);
            }
            return Err(error.into());
        }
        Ok(())
    }

    /// Correlate one reply by command id. Unknown ids are discarded.
    pub fn complete(&self, command_id: u32, result: std::result::Result<Bytes, String>) {
        let entry = {
            let mut guard = self.lock_send();
            guard
                .as_mut()
                .and_then(|state| state.pending.remove(&command_id))
        };
        match entry {
            Some(entry) => entry.completer.complete(RawReply { command_id, result }),
            None => debug!(command_id, "discarding reply with unknown command id"),
        }
    }

    /// Complete every outstanding request with an error response.
    pub fn fail_all_pending(&self, message: &str) {
        let drained = {
            let mut guard = self.lock_send();
            match guard.as_mut() {
                Some(state) => state.drain(),
                None => Vec::new(),
            }
        };
        for (command_id, completer) in drained {
            completer.complete(RawReply {
                command_id,
                result: Err(message.to_string()),
            });
        }
    }

    /// Tear down the send side: fail whatever is still pending and make
    /// subsequent public calls return "Not connected".
    pub fn close_send(&self, message: &str) {
        let taken = self.lock_send().take();
        if let Some(mut state) = taken {
            for (command_id, completer) in state.drain() {
                completer.complete(RawReply {
                    command_id,
                    result: Err(message.to_string()),
                });
            }
        }
    }

    /// The soonest pending-request deadline, if any.
    pub fn nearest_deadline(&self) -> Option<Instant> {
        self.lock_send()
            .as_ref()?
            .pending
            .values()
            .filter_map(|entry| entry.deadline)
            .min()
    }

    /// Whether any pending request has outlived its deadline.
    pub fn any_overdue(&self, now: Instant) -> bool {
        self.lock_send().as_ref().is_some_and(|state| {
            state
                .pending
                .values()
                .any(|entry| entry.deadline.is_some_and(|deadline| deadline <= now))
        })
    }

    pub fn register_callback(&self, name: String, callback: UpdateCallback) {
        self.lock_callbacks().insert(
            name,
            CallbackSlot {
                callback,
                last_delivered: None,
            },
        );
    }

    /// Deliver one notification: look up the slot, drop the update if the
    /// value matches the last delivered one, otherwise remember it and
    /// invoke the callback (outside the map lock).
    pub fn deliver_update(&self, record: Variable) {
        let callback = {
            let mut callbacks = self.lock_callbacks();
            let Some(slot) = callbacks.get_mut(&record.name) else {
                return;
            };
            if slot.last_delivered.as_ref() == Some(&record.value) {
                debug!(variable = %record.name, "suppressing duplicate update");
                return;
            }
            slot.last_delivered = Some(record.value.clone());
            Arc::clone(&slot.callback)
        };
        callback(&record.value);
    }

    fn lock_send(&self) -> MutexGuard<'_, Option<SendState>> {
        self.send.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_callbacks(&self) -> MutexGuard<'_, HashMap<String, CallbackSlot>> {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
