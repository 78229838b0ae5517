use std::time::Duration;

use bytes::BytesMut;
use proplink_transport::{ControlPair, Dealer, Subscriber, TransportError};
use proplink_wire::{encode_message, Command, Message};
use tracing::{info, warn};

use crate::client::ClientConfig;
use crate::state::ClientState;

/// Probe wait when no request timeout is configured.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Backoff schedule for the reconnect controller: delays double from
/// `initial_delay` up to `max_delay`, for at most `max_attempts` attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl ReconnectPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

pub(crate) enum ReconnectOutcome {
    /// Fresh sockets are connected and answering; outstanding requests
    /// were completed with "Connection reset during operation".
    Resumed {
        dealer: Dealer,
        subscriber: Subscriber,
    },
    /// The control channel asked the loop to stop.
    Stopped,
    /// Every attempt failed; outstanding requests were completed with
    /// "Failed to reconnect after maximum attempts".
    GaveUp,
}

/// Run the backoff-and-retry cycle after a dealer transport error.
///
/// Each attempt waits its backoff delay (interruptibly, watching the
/// control pair), rebuilds both sockets, and probes the server with a
/// `GetAllTriggers` request — zmq connects are asynchronous, so only an
/// answered probe proves the server is back.
pub(crate) fn run(
    ctx: &zmq::Context,
    config: &ClientConfig,
    state: &ClientState,
    control: &ControlPair,
) -> ReconnectOutcome {
    let policy = &config.reconnect;
    for attempt in 0..policy.max_attempts {
        let delay = policy.delay_for(attempt);
        info!(
            attempt = attempt + 1,
            max_attempts = policy.max_attempts,
            ?delay,
            "attempting to reconnect"
        );
        if wait_for_stop(control, delay) {
            return ReconnectOutcome::Stopped;
        }
        match try_connect(ctx, config, state, control) {
            Ok(Some((dealer, subscriber))) => {
                info!("reconnection successful");
                state.fail_all_pending("Connection reset during operation");
                return ReconnectOutcome::Resumed { dealer, subscriber };
            }
            Ok(None) => return ReconnectOutcome::Stopped,
            Err(error) => warn!(%error, "reconnect attempt failed"),
        }
    }

    warn!("max reconnection attempts reached; giving up");
    state.fail_all_pending("Failed to reconnect after maximum attempts");
    ReconnectOutcome::GaveUp
}

/// Wait out a backoff delay; returns true if the control pair fired.
fn wait_for_stop(control: &ControlPair, delay: Duration) -> bool {
    let mut items = [control.poll_item()];
    if let Err(error) = zmq::poll(&mut items, delay.as_millis() as i64) {
        warn!(%error, "poll failed while waiting to reconnect");
        return false;
    }
    if items[0].is_readable() {
        let _ = control.recv();
        return true;
    }
    false
}

/// Rebuild both sockets and probe for liveness. `Ok(None)` means the
/// control pair interrupted the probe.
fn try_connect(
    ctx: &zmq::Context,
    config: &ClientConfig,
    state: &ClientState,
    control: &ControlPair,
) -> proplink_transport::Result<Option<(Dealer, Subscriber)>> {
    let dealer = Dealer::connect(ctx, &config.command_endpoint, config.request_timeout)?;
    let subscriber = Subscriber::connect(ctx, &config.update_endpoint)?;

    let mut frame = BytesMut::new();
    encode_message(
        &Message::Command {
            command_id: state.next_id(),
            command: Command::GetAllTriggers,
        },
        &mut frame,
    );
    dealer.send(&frame)?;

    let timeout = config.request_timeout.unwrap_or(DEFAULT_PROBE_TIMEOUT);
    let mut items = [dealer.poll_item(), control.poll_item()];
    zmq::poll(&mut items, timeout.as_millis() as i64)?;
    if items[1].is_readable() {
        let _ = control.recv();
        return Ok(None);
    }
    if !items[0].is_readable() {
        return Err(TransportError::Timeout { role: "dealer" });
    }
    // Any decodable reply proves the server is back; its content is moot.
    let _ = dealer.recv()?;
    Ok(Some((dealer, subscriber)))
}
