use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use proplink_transport::{ControlPair, Dealer, PullQueue, PushQueue, Subscriber};
use proplink_wire::{
    decode_trigger_list_payload, decode_variable_list_payload, decode_variable_payload,
    encode_message, Command, Message, Value,
};
use tracing::{info, warn};

use crate::error::{ClientError, Result};
use crate::io::IoLoop;
use crate::pending::{CommandResult, Completer, SendState};
use crate::reconnect::ReconnectPolicy;
use crate::state::ClientState;

const CONTROL_ENDPOINT: &str = "inproc://control";
const REQUEST_ENDPOINT: &str = "inproc://requests";

/// Whether a request call waits for the server's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Block until the reply arrives (or the request fails).
    Sync,
    /// Return immediately; the completion callback is invoked from the
    /// I/O thread when the reply arrives.
    Async,
}

/// Completion callback for [`Client::set_variable`] and
/// [`Client::execute_trigger`].
///
/// Async callbacks run on the client's I/O thread and must not re-enter
/// blocking client calls, which need that thread to make progress.
pub type ReplyCallback = Box<dyn FnOnce(CommandResult) + Send>;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Endpoint of the server's command (router) socket.
    pub command_endpoint: String,
    /// Endpoint of the server's notification (publisher) socket.
    pub update_endpoint: String,
    /// Send/receive timeout on the command socket. `None` (the default)
    /// waits forever; a configured timeout makes an unanswered request
    /// count as a transport failure and triggers reconnect.
    pub request_timeout: Option<Duration>,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    pub fn new(command_endpoint: impl Into<String>, update_endpoint: impl Into<String>) -> Self {
        Self {
            command_endpoint: command_endpoint.into(),
            update_endpoint: update_endpoint.into(),
            request_timeout: None,
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }
}

/// A client of one PropLink server.
///
/// `open` connects the command and notification sockets and spawns the
/// I/O thread; requests may then be issued from any thread. On transport
/// failure the client reconnects transparently with exponential backoff;
/// if that fails, every public call returns "Not connected to server"
/// until the client is closed and reopened.
///
/// ```no_run
/// use proplink_client::{Client, RequestMode};
///
/// let mut client = Client::new("tcp://127.0.0.1:5555", "tcp://127.0.0.1:5556");
/// client.open()?;
/// let result = client.set_variable("exposure", 150.0, RequestMode::Sync, None)?;
/// assert!(result.is_some_and(|r| r.success));
/// let value = client.get_variable("exposure")?;
/// println!("exposure = {value}");
/// # Ok::<(), proplink_client::ClientError>(())
/// ```
pub struct Client {
    ctx: zmq::Context,
    config: ClientConfig,
    state: Arc<ClientState>,
    io_thread: Option<JoinHandle<()>>,
}

impl Client {
    pub fn new(command_endpoint: impl Into<String>, update_endpoint: impl Into<String>) -> Self {
        Self::with_config(ClientConfig::new(command_endpoint, update_endpoint))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            ctx: zmq::Context::new(),
            config,
            state: Arc::new(ClientState::new()),
            io_thread: None,
        }
    }

    /// Connect both sockets and spawn the I/O thread. Idempotent while
    /// open. Does not verify that a server is answering; the first
    /// request does that.
    pub fn open(&mut self) -> Result<()> {
        if self.io_thread.is_some() {
            if self.state.is_open() {
                return Ok(());
            }
            // The I/O thread gave up reconnecting; reap it before reopening.
            if let Some(handle) = self.io_thread.take() {
                let _ = handle.join();
            }
        }

        let dealer = Dealer::connect(
            &self.ctx,
            &self.config.command_endpoint,
            self.config.request_timeout,
        )?;
        let subscriber = Subscriber::connect(&self.ctx, &self.config.update_endpoint)?;
        let control = ControlPair::bind(&self.ctx, CONTROL_ENDPOINT)?;
        let requests = PullQueue::bind(&self.ctx, REQUEST_ENDPOINT)?;
        let queue = PushQueue::connect(&self.ctx, REQUEST_ENDPOINT)?;

        self.state.install_send(SendState::new(queue));
        let io = IoLoop {
            ctx: self.ctx.clone(),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            dealer,
            subscriber,
            requests,
            control,
        };
        let handle = thread::Builder::new()
            .name("proplink-client-io".to_string())
            .spawn(move || io.run())
            .map_err(|source| {
                self.state.close_send("Connection closed");
                ClientError::Spawn(source)
            })?;
        self.io_thread = Some(handle);
        info!(
            command = %self.config.command_endpoint,
            updates = %self.config.update_endpoint,
            "client opened"
        );
        Ok(())
    }

    /// Stop the I/O thread, close both sockets, and fail anything still
    /// outstanding. Idempotent.
    pub fn close(&mut self) {
        let Some(handle) = self.io_thread.take() else {
            return;
        };
        // Fails only if the loop already exited and dropped its socket.
        let _ = ControlPair::signal(&self.ctx, CONTROL_ENDPOINT);
        if handle.join().is_err() {
            warn!("client I/O thread panicked");
        }
        self.state.close_send("Connection closed");
        info!("client closed");
    }

    /// Whether the client is operating (open and not given up).
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Register a callback for server-pushed changes of one variable.
    /// May be called before or after `open`; re-registering replaces the
    /// callback and resets duplicate suppression.
    pub fn register_callback(
        &self,
        name: impl Into<String>,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) {
        self.state.register_callback(name.into(), Arc::new(callback));
    }

    /// Fetch one variable's current value.
    pub fn get_variable(&self, name: &str) -> Result<Value> {
        let payload = self.request_payload(Command::GetVariable {
            name: name.to_string(),
        })?;
        Ok(decode_variable_payload(&payload)?.value)
    }

    /// Fetch the full variable catalog as a name-to-value map.
    pub fn get_all_variables(&self) -> Result<HashMap<String, Value>> {
        let payload = self.request_payload(Command::GetAllVariables)?;
        Ok(decode_variable_list_payload(&payload)?
            .into_iter()
            .map(|record| (record.name, record.value))
            .collect())
    }

    /// Fetch the names of all registered triggers.
    pub fn get_all_triggers(&self) -> Result<Vec<String>> {
        let payload = self.request_payload(Command::GetAllTriggers)?;
        Ok(decode_trigger_list_payload(&payload)?)
    }

    /// Ask the server to change a variable's value.
    ///
    /// Sync returns `Ok(Some(result))` once the reply (or failure) is in;
    /// Async returns `Ok(None)` immediately and delivers the result to
    /// the callback from the I/O thread. Both modes invoke the callback
    /// if one is given. Read-only and type-mismatch rejections arrive as
    /// an unsuccessful [`CommandResult`], not as `Err`.
    pub fn set_variable(
        &self,
        name: &str,
        value: impl Into<Value>,
        mode: RequestMode,
        callback: Option<ReplyCallback>,
    ) -> Result<Option<CommandResult>> {
        self.dispatch_command(
            Command::SetVariable {
                name: name.to_string(),
                value: value.into(),
            },
            mode,
            callback,
        )
    }

    /// Ask the server to execute a trigger by name.
    pub fn execute_trigger(
        &self,
        name: &str,
        mode: RequestMode,
        callback: Option<ReplyCallback>,
    ) -> Result<Option<CommandResult>> {
        self.dispatch_command(
            Command::ExecuteTrigger {
                name: name.to_string(),
            },
            mode,
            callback,
        )
    }

    fn dispatch_command(
        &self,
        command: Command,
        mode: RequestMode,
        callback: Option<ReplyCallback>,
    ) -> Result<Option<CommandResult>> {
        match mode {
            RequestMode::Async => {
                let completer = Completer::Callback(Box::new(move |raw| {
                    let result = CommandResult::from_raw(raw);
                    if let Some(callback) = callback {
                        callback(result);
                    }
                }));
                self.submit(command, completer)?;
                Ok(None)
            }
            RequestMode::Sync => {
                let (tx, rx) = crossbeam::channel::bounded(1);
                let command_id = self.submit(command, Completer::Channel(tx))?;
                let result = match rx.recv() {
                    Ok(raw) => CommandResult::from_raw(raw),
                    Err(_) => CommandResult {
                        command_id,
                        success: false,
                        message: "Connection closed".to_string(),
                    },
                };
                if let Some(callback) = callback {
                    callback(result.clone());
                }
                Ok(Some(result))
            }
        }
    }

    /// Issue a command and block for its raw success payload.
    fn request_payload(&self, command: Command) -> Result<Bytes> {
        let (tx, rx) = crossbeam::channel::bounded(1);
        self.submit(command, Completer::Channel(tx))?;
        match rx.recv() {
            Ok(raw) => raw.result.map_err(ClientError::ErrorResponse),
            Err(_) => Err(ClientError::NotConnected),
        }
    }

    /// Allocate a command id, register the correlation entry, and hand
    /// the encoded frame to the I/O thread.
    fn submit(&self, command: Command, completer: Completer) -> Result<u32> {
        let command_id = self.state.next_id();
        let mut frame = BytesMut::new();
        encode_message(
            &Message::Command {
                command_id,
                command,
            },
            &mut frame,
        );
        let deadline = self
            .config
            .request_timeout
            .map(|timeout| Instant::now() + timeout);
        self.state.submit(command_id, &frame, completer, deadline)?;
        Ok(command_id)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}
