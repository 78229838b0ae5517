#![allow(dead_code)]

use std::time::{Duration, Instant};

use proplink::{Client, ClientConfig, ReconnectPolicy};
use tempfile::TempDir;

/// How long to let a fresh subscription settle before provoking
/// notifications (pub/sub joins are asynchronous).
pub const SUBSCRIBE_SETTLE: Duration = Duration::from_millis(300);

/// Per-test `ipc://` endpoints in a private temp directory.
pub struct Endpoints {
    _dir: TempDir,
    pub command: String,
    pub update: String,
}

pub fn endpoints() -> Endpoints {
    let dir = tempfile::tempdir().expect("temp dir should be creatable");
    let command = format!("ipc://{}", dir.path().join("cmd.sock").display());
    let update = format!("ipc://{}", dir.path().join("pub.sock").display());
    Endpoints {
        _dir: dir,
        command,
        update,
    }
}

/// A client for these endpoints with a test-friendly request timeout.
pub fn client(endpoints: &Endpoints) -> Client {
    client_for(&endpoints.command, &endpoints.update)
}

/// Same, from bare endpoint strings (handy inside spawned threads).
pub fn client_for(command: &str, update: &str) -> Client {
    Client::with_config(
        ClientConfig::new(command, update).with_request_timeout(Duration::from_secs(5)),
    )
}

/// A fast reconnect policy so failure tests stay inside the harness
/// timeout.
pub fn snappy_reconnect() -> ReconnectPolicy {
    ReconnectPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(400),
    }
}

/// Poll `pred` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    pred()
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}
