use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use proplink_wire::{Value, ValueKind, Variable};
use tracing::{debug, warn};

use crate::notifier::Notifier;

/// Invoked when a client changes a variable's value. Never invoked for
/// server-side writes.
pub type ChangeCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Invoked when a client executes a trigger.
pub type TriggerCallback = Arc<dyn Fn() + Send + Sync>;

struct VariableEntry {
    value: Value,
    read_only: bool,
    on_change: Option<ChangeCallback>,
}

/// Result of a client-initiated write, computed under the variables lock.
///
/// On `Updated` the store has already been mutated and the notification
/// published; the captured callback is for the caller to invoke outside
/// all locks.
pub(crate) enum SetOutcome {
    Updated {
        new_value: Value,
        on_change: Option<ChangeCallback>,
    },
    Unchanged,
    NotFound,
    ReadOnly,
    TypeMismatch {
        expected: ValueKind,
    },
}

/// The variable and trigger catalogs, each behind its own mutex.
///
/// Entries are inserted or replaced by registration and never removed at
/// runtime. A variable's value kind is latched by registration.
pub(crate) struct Catalog {
    variables: Mutex<HashMap<String, VariableEntry>>,
    triggers: Mutex<HashMap<String, TriggerCallback>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            variables: Mutex::new(HashMap::new()),
            triggers: Mutex::new(HashMap::new()),
        }
    }

    pub fn register_variable(&self, variable: Variable, on_change: Option<ChangeCallback>) {
        debug!(name = %variable.name, kind = %variable.value.kind(), read_only = variable.read_only, "registered variable");
        lock(&self.variables).insert(
            variable.name,
            VariableEntry {
                value: variable.value,
                read_only: variable.read_only,
                on_change,
            },
        );
    }

    pub fn register_trigger(&self, name: String, on_fire: TriggerCallback) {
        debug!(%name, "registered trigger");
        lock(&self.triggers).insert(name, on_fire);
    }

    /// Snapshot of every variable's current value.
    pub fn values(&self) -> HashMap<String, Value> {
        lock(&self.variables)
            .iter()
            .map(|(name, entry)| (name.clone(), entry.value.clone()))
            .collect()
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        lock(&self.variables).get(name).map(|e| e.value.clone())
    }

    /// Full record for one variable, as sent in `GetVariable` responses.
    pub fn record(&self, name: &str) -> Option<Variable> {
        lock(&self.variables).get(name).map(|entry| Variable {
            name: name.to_string(),
            value: entry.value.clone(),
            read_only: entry.read_only,
        })
    }

    /// Full records for the catalog, as sent in `GetAllVariables` responses.
    pub fn records(&self) -> Vec<Variable> {
        lock(&self.variables)
            .iter()
            .map(|(name, entry)| Variable {
                name: name.clone(),
                value: entry.value.clone(),
                read_only: entry.read_only,
            })
            .collect()
    }

    pub fn trigger_names(&self) -> Vec<String> {
        lock(&self.triggers).keys().cloned().collect()
    }

    pub fn trigger(&self, name: &str) -> Option<TriggerCallback> {
        lock(&self.triggers).get(name).map(Arc::clone)
    }

    /// Client write path: enforces read-only and kind pinning, suppresses
    /// no-op writes, and publishes the accepted change while still holding
    /// the variables lock so notification order matches mutation order.
    pub fn set_from_client(&self, name: &str, value: Value, notifier: &Notifier) -> SetOutcome {
        let mut variables = lock(&self.variables);
        let Some(entry) = variables.get_mut(name) else {
            return SetOutcome::NotFound;
        };
        if entry.read_only {
            return SetOutcome::ReadOnly;
        }
        if entry.value.kind() != value.kind() {
            return SetOutcome::TypeMismatch {
                expected: entry.value.kind(),
            };
        }
        if entry.value == value {
            return SetOutcome::Unchanged;
        }

        entry.value = value.clone();
        let on_change = entry.on_change.clone();
        let read_only = entry.read_only;
        notifier.publish(&Variable {
            name: name.to_string(),
            value: value.clone(),
            read_only,
        });
        SetOutcome::Updated {
            new_value: value,
            on_change,
        }
    }

    /// Server write path: may change read-only variables, never invokes
    /// the on-change callback. Unknown names and no-op writes return
    /// without side effects. Returns whether the value changed.
    pub fn set_from_server(&self, name: &str, value: Value, notifier: &Notifier) -> bool {
        let mut variables = lock(&self.variables);
        let Some(entry) = variables.get_mut(name) else {
            warn!(%name, "no registered variable with that name");
            return false;
        };
        if entry.value == value {
            return false;
        }
        if entry.value.kind() != value.kind() {
            warn!(
                %name,
                expected = %entry.value.kind(),
                got = %value.kind(),
                "server-side write with mismatched kind ignored"
            );
            return false;
        }

        entry.value = value.clone();
        notifier.publish(&Variable {
            name: name.to_string(),
            value,
            read_only: entry.read_only,
        });
        true
    }
}

/// Everything the worker pool shares with the public `Server` handle.
pub(crate) struct Shared {
    pub catalog: Catalog,
    pub notifier: Notifier,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
