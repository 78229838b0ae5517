//! Authoritative variable/trigger server for the PropLink runtime.
//!
//! A [`Server`] owns a catalog of named, typed variables and named
//! triggers. Clients read and write variables and execute triggers over
//! the command channel; every accepted change is broadcast on the
//! notification channel. Requests are handled by a fixed worker pool so
//! one slow user callback cannot stall the other clients.

mod dispatch;
pub mod error;
mod notifier;
mod pool;
pub mod server;
mod store;

pub use error::{Result, ServerError};
pub use server::Server;
pub use store::{ChangeCallback, TriggerCallback};
