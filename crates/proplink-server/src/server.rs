use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use proplink_transport::{ControlPair, Publisher, PullQueue, Router};
use proplink_wire::{Value, Variable};
use tracing::{info, warn};

use crate::dispatch;
use crate::error::{Result, ServerError};
use crate::notifier::Notifier;
use crate::pool::WorkerPool;
use crate::store::{Catalog, ChangeCallback, Shared};

const CONTROL_ENDPOINT: &str = "inproc://control";
const REPLY_ENDPOINT: &str = "inproc://replies";

/// The authoritative owner of a variable and trigger catalog.
///
/// Construct, register variables and triggers (before or after `start`),
/// then `start` to bind the command and notification endpoints and begin
/// serving. Each instance owns its zmq context, so several servers can
/// coexist in one process as long as their endpoint strings differ.
///
/// ```no_run
/// use proplink_server::Server;
/// use proplink_wire::Variable;
///
/// let mut server = Server::new("tcp://127.0.0.1:5555", "tcp://127.0.0.1:5556");
/// server.register_variable(Variable::new("exposure", 100.0))?;
/// server.start()?;
/// # Ok::<(), proplink_server::ServerError>(())
/// ```
pub struct Server {
    ctx: zmq::Context,
    shared: Arc<Shared>,
    router_endpoints: Vec<String>,
    pub_endpoints: Vec<String>,
    worker_threads: usize,
    running: Arc<AtomicBool>,
    dispatch: Option<JoinHandle<()>>,
    pool: Option<WorkerPool>,
}

impl Server {
    /// A server with one command endpoint and one notification endpoint.
    pub fn new(router_endpoint: impl Into<String>, pub_endpoint: impl Into<String>) -> Self {
        Self::with_endpoints(vec![router_endpoint.into()], vec![pub_endpoint.into()])
    }

    /// A server that additionally binds a second command/notification
    /// endpoint pair, segregating trusted from untrusted peers. Both
    /// routers are served by the same worker pool and catalog.
    pub fn with_external_endpoints(
        internal_router: impl Into<String>,
        internal_pub: impl Into<String>,
        external_router: impl Into<String>,
        external_pub: impl Into<String>,
    ) -> Self {
        Self::with_endpoints(
            vec![internal_router.into(), external_router.into()],
            vec![internal_pub.into(), external_pub.into()],
        )
    }

    fn with_endpoints(router_endpoints: Vec<String>, pub_endpoints: Vec<String>) -> Self {
        Self {
            ctx: zmq::Context::new(),
            shared: Arc::new(Shared {
                catalog: Catalog::new(),
                notifier: Notifier::new(),
            }),
            router_endpoints,
            pub_endpoints,
            worker_threads: default_worker_threads(),
            running: Arc::new(AtomicBool::new(false)),
            dispatch: None,
            pool: None,
        }
    }

    /// Override the worker pool size (default: available parallelism).
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads.max(1);
        self
    }

    /// Register a variable. Replaces any existing entry of the same name
    /// and latches the value's kind.
    pub fn register_variable(&self, variable: Variable) -> Result<()> {
        self.register(variable, None)
    }

    /// Register a variable with a change callback. The callback fires only
    /// for client-originated changes, never for [`Server::set_variable`].
    pub fn register_variable_with(
        &self,
        variable: Variable,
        on_change: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Result<()> {
        self.register(variable, Some(Arc::new(on_change)))
    }

    fn register(&self, variable: Variable, on_change: Option<ChangeCallback>) -> Result<()> {
        if variable.name.is_empty() {
            return Err(ServerError::EmptyName { kind: "variable" });
        }
        self.shared.catalog.register_variable(variable, on_change);
        Ok(())
    }

    /// Register a trigger. Replaces any existing entry of the same name.
    pub fn register_trigger(
        &self,
        name: impl Into<String>,
        on_fire: impl Fn() + Send + Sync + 'static,
    ) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(ServerError::EmptyName { kind: "trigger" });
        }
        self.shared.catalog.register_trigger(name, Arc::new(on_fire));
        Ok(())
    }

    /// Bind all sockets, spawn the worker pool and dispatch thread, and
    /// begin serving. Idempotent while running. On a bind failure every
    /// socket acquired so far is released before returning.
    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::Acquire) {
            info!("server is already running");
            return Ok(());
        }
        // A previous run may have ended on its own (poll failure); reap it
        // so the endpoints are free to bind again.
        self.stop();

        let routers = self
            .router_endpoints
            .iter()
            .map(|endpoint| Router::bind(&self.ctx, endpoint))
            .collect::<proplink_transport::Result<Vec<_>>>()?;
        let publishers = self
            .pub_endpoints
            .iter()
            .map(|endpoint| Publisher::bind(&self.ctx, endpoint))
            .collect::<proplink_transport::Result<Vec<_>>>()?;
        let control = ControlPair::bind(&self.ctx, CONTROL_ENDPOINT)?;
        let replies = PullQueue::bind(&self.ctx, REPLY_ENDPOINT)?;

        self.shared.notifier.activate(publishers);
        let pool = match WorkerPool::spawn(
            self.worker_threads,
            &self.ctx,
            REPLY_ENDPOINT,
            Arc::clone(&self.shared),
        ) {
            Ok(pool) => pool,
            Err(error) => {
                self.shared.notifier.deactivate();
                return Err(error);
            }
        };
        let Some(jobs) = pool.sender() else {
            self.shared.notifier.deactivate();
            return Err(ServerError::Spawn {
                name: "worker",
                source: std::io::Error::other("worker pool has no job queue"),
            });
        };

        let running = Arc::clone(&self.running);
        let dispatch = thread::Builder::new()
            .name("proplink-dispatch".to_string())
            .spawn(move || {
                dispatch::run(&routers, &replies, &control, &jobs);
                running.store(false, Ordering::Release);
            })
            .map_err(|source| {
                self.shared.notifier.deactivate();
                ServerError::Spawn {
                    name: "dispatch",
                    source,
                }
            })?;

        self.running.store(true, Ordering::Release);
        self.dispatch = Some(dispatch);
        self.pool = Some(pool);
        info!(
            command = ?self.router_endpoints,
            notify = ?self.pub_endpoints,
            workers = self.worker_threads,
            "server started"
        );
        Ok(())
    }

    /// Wake the dispatch loop, join it, drain and join the worker pool,
    /// and release every socket. Idempotent.
    pub fn stop(&mut self) {
        if self.dispatch.is_none() && self.pool.is_none() {
            return;
        }
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.dispatch.take() {
            // Fails only if the loop already exited and dropped its socket.
            let _ = ControlPair::signal(&self.ctx, CONTROL_ENDPOINT);
            if handle.join().is_err() {
                warn!("dispatch thread panicked");
            }
        }
        if let Some(mut pool) = self.pool.take() {
            pool.join();
        }
        self.shared.notifier.deactivate();
        info!("server stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Snapshot of every variable's current value.
    pub fn variables(&self) -> HashMap<String, Value> {
        self.shared.catalog.values()
    }

    pub fn variable(&self, name: &str) -> Option<Value> {
        self.shared.catalog.value(name)
    }

    /// Server-side write. May change read-only variables; equal values are
    /// ignored to break feedback loops; the change callback never fires.
    /// Publishes one notification if the server is running and the value
    /// changed. Unknown names are logged and ignored.
    pub fn set_variable(&self, name: &str, value: impl Into<Value>) {
        self.shared
            .catalog
            .set_from_server(name, value.into(), &self.shared.notifier);
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

fn default_worker_threads() -> usize {
    thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_rejects_empty_names() {
        let server = Server::new("inproc://srv-cmd", "inproc://srv-pub");
        assert!(matches!(
            server.register_variable(Variable::new("", 1i64)),
            Err(ServerError::EmptyName { kind: "variable" })
        ));
        assert!(matches!(
            server.register_trigger("", || {}),
            Err(ServerError::EmptyName { kind: "trigger" })
        ));
    }

    #[test]
    fn registration_is_accepted_before_start() {
        let server = Server::new("inproc://srv-reg-cmd", "inproc://srv-reg-pub");
        server
            .register_variable(Variable::new("exposure", 100.0))
            .expect("registration should succeed");
        assert_eq!(server.variable("exposure"), Some(Value::Float(100.0)));
        assert_eq!(server.variables().len(), 1);
    }

    #[test]
    fn set_variable_while_stopped_updates_silently() {
        let server = Server::new("inproc://srv-set-cmd", "inproc://srv-set-pub");
        server
            .register_variable(Variable::read_only("connected", true))
            .expect("registration should succeed");
        server.set_variable("connected", false);
        assert_eq!(server.variable("connected"), Some(Value::Bool(false)));
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let mut server = Server::new("inproc://srv-idem-cmd", "inproc://srv-idem-pub");
        server.start().expect("first start should succeed");
        assert!(server.is_running());
        server.start().expect("second start should be a no-op");
        server.stop();
        assert!(!server.is_running());
        server.stop();
    }

    #[test]
    fn start_fails_cleanly_on_a_taken_endpoint() {
        let dir = std::env::temp_dir().join(format!("proplink-srv-dup-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let cmd = format!("ipc://{}", dir.join("cmd.sock").display());
        let notify = format!("ipc://{}", dir.join("pub.sock").display());

        let mut first = Server::new(cmd.clone(), notify.clone());
        first.start().expect("first bind should succeed");

        // Same endpoint strings, different context: the bind must fail and
        // leave the new server stopped.
        let mut second = Server::new(cmd, notify);
        assert!(second.start().is_err());
        assert!(!second.is_running());

        first.stop();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn restart_after_stop_works() {
        let mut server = Server::new("inproc://srv-restart-cmd", "inproc://srv-restart-pub");
        server.start().expect("first start should succeed");
        server.stop();
        server.start().expect("restart should succeed");
        assert!(server.is_running());
        server.stop();
    }
}
