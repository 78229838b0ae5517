//! Role-typed ZeroMQ sockets for the PropLink runtime.
//!
//! Three channels connect a server to its clients:
//! - command: [`Router`] (server, binds) / [`Dealer`] (client, connects)
//! - notification: [`Publisher`] / [`Subscriber`] fan-out
//! - control: [`ControlPair`] inproc wakeup for blocked poll loops
//!
//! [`PushQueue`]/[`PullQueue`] are inproc handoff queues so that every zmq
//! socket has exactly one polling owner. Endpoints are transport URIs
//! (`tcp://host:port`, `ipc:///path`, `inproc://name`); the wire codec
//! above this layer is transport-agnostic.

pub mod command;
pub mod control;
pub mod error;
pub mod fanout;
pub mod queue;

pub use command::{Dealer, RoutedMessage, Router};
pub use control::{ControlPair, STOP_FRAME};
pub use error::{Result, TransportError};
pub use fanout::{Publisher, Subscriber};
pub use queue::{PullQueue, PushQueue};
