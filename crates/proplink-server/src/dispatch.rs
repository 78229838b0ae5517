use std::panic::{catch_unwind, AssertUnwindSafe};

use bytes::BytesMut;
use crossbeam::channel::Sender;
use proplink_transport::{ControlPair, PullQueue, RoutedMessage, Router};
use proplink_wire::{
    decode_message, encode_info_payload, encode_message, encode_trigger_list_payload,
    encode_variable_list_payload, encode_variable_payload, peek_msg_id, Command, Message,
    WireError,
};
use tracing::{debug, info, warn};

use crate::pool::Job;
use crate::store::{SetOutcome, Shared};

/// The dispatch loop: sole owner of the router sockets.
///
/// Polls the routers, the worker reply queue, and the control pair.
/// Inbound bodies are parsed here and enqueued; completed replies come
/// back over the reply queue and leave through the router they arrived on.
/// All protocol errors are answered in-band; only the control frame (or a
/// dead poll) ends the loop.
pub(crate) fn run(
    routers: &[Router],
    replies: &PullQueue,
    control: &ControlPair,
    jobs: &Sender<Job>,
) {
    info!("dispatch loop started");
    loop {
        let mut items: Vec<zmq::PollItem<'_>> = routers.iter().map(Router::poll_item).collect();
        items.push(replies.poll_item());
        items.push(control.poll_item());

        if let Err(error) = zmq::poll(&mut items, -1) {
            warn!(%error, "dispatch poll failed; stopping");
            break;
        }

        let reply_ready = items[routers.len()].is_readable();
        let control_ready = items[routers.len() + 1].is_readable();
        let ready: Vec<bool> = items[..routers.len()]
            .iter()
            .map(zmq::PollItem::is_readable)
            .collect();
        drop(items);

        for (origin, router) in routers.iter().enumerate() {
            if !ready[origin] {
                continue;
            }
            match router.recv() {
                Ok(request) => accept_request(router, origin as u8, request, jobs),
                Err(error) => warn!(%error, endpoint = router.endpoint(), "router receive failed"),
            }
        }

        if reply_ready {
            forward_replies(routers, replies);
        }

        if control_ready {
            let _ = control.recv();
            info!("dispatch loop stopping");
            break;
        }
    }
}

/// Parse an inbound body and either enqueue it for a worker or answer a
/// parse error straight away; nothing that arrives here ends the loop.
fn accept_request(router: &Router, origin: u8, request: RoutedMessage, jobs: &Sender<Job>) {
    let RoutedMessage {
        identity,
        delimiter,
        body,
    } = request;

    match decode_message(&body) {
        Ok(Message::Command {
            command_id,
            command,
        }) => {
            debug!(command_id, command = command.name(), "request accepted");
            let job = Job {
                origin,
                identity,
                delimiter,
                command_id,
                command,
            };
            if jobs.send(job).is_err() {
                warn!("worker pool is gone; dropping request");
            }
        }
        Ok(other) => {
            // A response or notification has no business on this channel.
            send_error(
                router,
                &identity,
                &delimiter,
                other.command_id(),
                "Unknown command type",
            );
        }
        Err(WireError::UnknownMessageType { msg_id, code }) => {
            debug!(code, msg_id, "unknown command type");
            send_error(router, &identity, &delimiter, msg_id, "Unknown command type");
        }
        Err(error) => {
            let msg_id = peek_msg_id(&body).unwrap_or(0);
            debug!(%error, msg_id, "malformed command");
            send_error(
                router,
                &identity,
                &delimiter,
                msg_id,
                &format!("Malformed command: {error}"),
            );
        }
    }
}

fn send_error(router: &Router, identity: &[u8], delimiter: &[u8], command_id: u32, message: &str) {
    let mut body = BytesMut::new();
    encode_message(
        &Message::Error {
            command_id,
            message: message.to_string(),
        },
        &mut body,
    );
    if let Err(error) = router.send(identity, delimiter, &body) {
        warn!(%error, "failed to send error response");
    }
}

/// Drain the worker reply queue and send each reply out the router the
/// request arrived on.
fn forward_replies(routers: &[Router], replies: &PullQueue) {
    loop {
        let frames = match replies.try_recv() {
            Ok(Some(frames)) => frames,
            Ok(None) => return,
            Err(error) => {
                warn!(%error, "reply queue receive failed");
                return;
            }
        };
        let [origin, identity, delimiter, body]: [Vec<u8>; 4] = match frames.try_into() {
            Ok(parts) => parts,
            Err(frames) => {
                warn!(frames = frames.len(), "malformed reply from worker");
                continue;
            }
        };
        let Some(router) = origin.first().and_then(|&o| routers.get(o as usize)) else {
            warn!("reply names a router that does not exist");
            continue;
        };
        if let Err(error) = router.send(&identity, &delimiter, &body) {
            warn!(%error, "failed to send reply");
        }
    }
}

/// Compute the response for one command. Runs on a worker thread; user
/// callbacks execute here, outside every catalog lock.
pub(crate) fn handle_command(shared: &Shared, command_id: u32, command: Command) -> Message {
    match command {
        Command::GetVariable { name } => match shared.catalog.record(&name) {
            Some(record) => Message::Success {
                command_id,
                payload: encode_variable_payload(&record),
            },
            None => Message::Error {
                command_id,
                message: format!("Variable not found: {name}"),
            },
        },

        Command::GetAllVariables => Message::Success {
            command_id,
            payload: encode_variable_list_payload(&shared.catalog.records()),
        },

        Command::GetAllTriggers => Message::Success {
            command_id,
            payload: encode_trigger_list_payload(&shared.catalog.trigger_names()),
        },

        Command::SetVariable { name, value } => {
            match shared.catalog.set_from_client(&name, value, &shared.notifier) {
                SetOutcome::Updated {
                    new_value,
                    on_change,
                } => {
                    if let Some(on_change) = on_change {
                        let outcome = catch_unwind(AssertUnwindSafe(|| on_change(&new_value)));
                        if outcome.is_err() {
                            warn!(variable = %name, "on-change callback panicked");
                            return Message::Error {
                                command_id,
                                message: "Exception occurred in server-side callback".to_string(),
                            };
                        }
                    }
                    Message::Success {
                        command_id,
                        payload: encode_info_payload(Some(&format!("Variable updated: {name}"))),
                    }
                }
                SetOutcome::Unchanged => Message::Success {
                    command_id,
                    payload: encode_info_payload(None),
                },
                SetOutcome::NotFound => Message::Error {
                    command_id,
                    message: format!("Variable not found: {name}"),
                },
                SetOutcome::ReadOnly => Message::Error {
                    command_id,
                    message: format!("Variable {name} is READ ONLY"),
                },
                SetOutcome::TypeMismatch { expected } => Message::Error {
                    command_id,
                    message: format!(
                        "Type mismatch: Variable '{name}' is {expected}, but received non-{expected} value"
                    ),
                },
            }
        }

        Command::ExecuteTrigger { name } => match shared.catalog.trigger(&name) {
            Some(on_fire) => {
                if catch_unwind(AssertUnwindSafe(|| on_fire())).is_err() {
                    warn!(trigger = %name, "trigger callback panicked");
                }
                Message::Success {
                    command_id,
                    payload: encode_info_payload(Some(&format!("Trigger executed: {name}"))),
                }
            }
            None => Message::Error {
                command_id,
                message: format!("Failed to execute trigger: {name}"),
            },
        },
    }
}
