use std::sync::Arc;
use std::time::Instant;

use proplink_transport::{ControlPair, Dealer, PullQueue, Subscriber};
use proplink_wire::{decode_message, Message};
use tracing::{debug, warn};

use crate::client::ClientConfig;
use crate::reconnect::{self, ReconnectOutcome};
use crate::state::ClientState;

/// The client's single I/O thread.
///
/// Sole owner of the dealer and subscriber sockets. Multiplexes four
/// sources: dealer replies (correlated by command id), subscriber
/// notifications (deduplicated per variable), the request handoff queue
/// (frames to send on the dealer), and the control pair (stop).
pub(crate) struct IoLoop {
    pub ctx: zmq::Context,
    pub config: ClientConfig,
    pub state: Arc<ClientState>,
    pub dealer: Dealer,
    pub subscriber: Subscriber,
    pub requests: PullQueue,
    pub control: ControlPair,
}

impl IoLoop {
    pub fn run(mut self) {
        debug!("client I/O loop started");
        let mut need_reconnect = false;
        loop {
            if need_reconnect {
                match reconnect::run(&self.ctx, &self.config, &self.state, &self.control) {
                    ReconnectOutcome::Resumed { dealer, subscriber } => {
                        self.dealer = dealer;
                        self.subscriber = subscriber;
                        need_reconnect = false;
                    }
                    ReconnectOutcome::Stopped => break,
                    ReconnectOutcome::GaveUp => break,
                }
            }

            let timeout = self.poll_timeout();
            let mut items = [
                self.dealer.poll_item(),
                self.subscriber.poll_item(),
                self.requests.poll_item(),
                self.control.poll_item(),
            ];
            if let Err(error) = zmq::poll(&mut items, timeout) {
                warn!(%error, "client poll failed; stopping");
                break;
            }
            let dealer_ready = items[0].is_readable();
            let subscriber_ready = items[1].is_readable();
            let requests_ready = items[2].is_readable();
            let control_ready = items[3].is_readable();
            drop(items);

            if dealer_ready {
                need_reconnect |= self.read_reply();
            }
            if subscriber_ready {
                self.read_update();
            }
            if requests_ready {
                need_reconnect |= self.send_queued_requests();
            }
            if control_ready {
                let _ = self.control.recv();
                debug!("client I/O loop stopping");
                break;
            }
            if !need_reconnect && self.state.any_overdue(Instant::now()) {
                // A reply is overdue; treat it as a dead connection. The
                // reconnect controller completes the outstanding requests.
                warn!("receive timeout on dealer socket");
                need_reconnect = true;
            }
        }

        // Whatever is still pending can no longer complete.
        self.state.close_send("Connection closed");
        debug!("client I/O thread stopped");
    }

    /// Sleep until socket activity or the nearest request deadline.
    fn poll_timeout(&self) -> i64 {
        match self.state.nearest_deadline() {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                remaining.as_millis() as i64 + 1
            }
            None => -1,
        }
    }

    /// Returns true if the dealer failed and the loop must reconnect.
    fn read_reply(&self) -> bool {
        let body = match self.dealer.recv() {
            Ok(body) => body,
            Err(error) => {
                warn!(%error, "dealer receive failed");
                return true;
            }
        };
        match decode_message(&body) {
            Ok(Message::Success {
                command_id,
                payload,
            }) => self.state.complete(command_id, Ok(payload)),
            Ok(Message::Error {
                command_id,
                message,
            }) => self.state.complete(command_id, Err(message)),
            Ok(other) => {
                debug!(msg_type = other.msg_type(), "ignoring unexpected message on command channel");
            }
            Err(error) => warn!(%error, "discarding malformed reply"),
        }
        false
    }

    /// Subscriber errors are logged but never trigger reconnect; losing a
    /// few notifications is acceptable.
    fn read_update(&self) {
        let frame = match self.subscriber.recv() {
            Ok(frame) => frame,
            Err(error) => {
                warn!(%error, "subscriber receive failed");
                return;
            }
        };
        match decode_message(&frame) {
            Ok(Message::Update(record)) => self.state.deliver_update(record),
            Ok(other) => {
                debug!(msg_type = other.msg_type(), "ignoring unexpected message on notification channel");
            }
            Err(error) => warn!(%error, "discarding malformed notification"),
        }
    }

    /// Drain the handoff queue onto the dealer. Returns true on a send
    /// failure; the unsent frame's entry stays pending for the reconnect
    /// controller, and frames still queued are retried after reconnect.
    fn send_queued_requests(&self) -> bool {
        loop {
            let frames = match self.requests.try_recv() {
                Ok(Some(frames)) => frames,
                Ok(None) => return false,
                Err(error) => {
                    warn!(%error, "request queue receive failed");
                    return false;
                }
            };
            let Some(body) = frames.into_iter().next() else {
                continue;
            };
            if let Err(error) = self.dealer.send(&body) {
                if error.is_timeout() {
                    warn!("send timeout on dealer socket");
                } else {
                    warn!(%error, "dealer send failed");
                }
                return true;
            }
        }
    }
}
