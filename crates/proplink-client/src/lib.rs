//! Observing/modifying client for the PropLink runtime.
//!
//! A [`Client`] reads and writes a server's variable catalog, executes
//! triggers, and subscribes to server-pushed change notifications. All
//! socket I/O happens on one dedicated thread; replies are correlated to
//! requests by command id, so they may complete out of submission order
//! without misdelivery. Transport failures trigger transparent reconnect
//! with exponential backoff.

pub mod client;
pub mod error;
mod io;
mod pending;
pub mod reconnect;
mod state;

pub use client::{Client, ClientConfig, ReplyCallback, RequestMode};
pub use error::{ClientError, Result};
pub use pending::CommandResult;
pub use reconnect::ReconnectPolicy;
pub use state::UpdateCallback;
