//! Shared typed variables and triggers between a server and its clients.
//!
//! A [`Server`] owns the authoritative catalog: named, typed variables
//! (bool, int, float, string) and named triggers. Any number of
//! [`Client`]s read the catalog, write variables, execute triggers, and
//! subscribe to change notifications. The server enforces read-only flags
//! and value kinds, runs registered callbacks on a worker pool, and
//! broadcasts every accepted change.
//!
//! ```no_run
//! use proplink::{Client, RequestMode, Server, Variable};
//!
//! // Server side: register state, then serve.
//! let mut server = Server::new("tcp://127.0.0.1:5555", "tcp://127.0.0.1:5556");
//! server.register_variable(Variable::new("exposure", 100.0))?;
//! server.register_trigger("capture", || println!("captured"))?;
//! server.start()?;
//!
//! // Client side: observe and modify.
//! let mut client = Client::new("tcp://127.0.0.1:5555", "tcp://127.0.0.1:5556");
//! client.register_callback("exposure", |value| println!("exposure -> {value}"));
//! client.open()?;
//! let result = client.set_variable("exposure", 150.0, RequestMode::Sync, None)?;
//! assert!(result.is_some_and(|r| r.success));
//! let _ = client.execute_trigger("capture", RequestMode::Async, None)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use proplink_client::{
    Client, ClientConfig, ClientError, CommandResult, ReconnectPolicy, ReplyCallback, RequestMode,
    UpdateCallback,
};
pub use proplink_server::{ChangeCallback, Server, ServerError, TriggerCallback};
pub use proplink_wire::{Value, ValueKind, Variable};
