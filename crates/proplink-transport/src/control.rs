use tracing::debug;

use crate::error::{Result, TransportError};

/// The frame sent to wake and stop a blocked poll loop.
pub const STOP_FRAME: &[u8] = b"STOP";

/// In-process wakeup channel.
///
/// The poll loop binds a PAIR socket on an inproc endpoint and includes it
/// in its poll set; [`ControlPair::signal`] connects a transient peer and
/// sends [`STOP_FRAME`]. Endpoints are scoped to a context, so every
/// server or client instance can use the same name.
pub struct ControlPair {
    socket: zmq::Socket,
}

impl ControlPair {
    pub fn bind(ctx: &zmq::Context, endpoint: &str) -> Result<Self> {
        let socket = ctx.socket(zmq::PAIR)?;
        socket.set_linger(0)?;
        socket.bind(endpoint).map_err(|source| TransportError::Bind {
            role: "control",
            endpoint: endpoint.to_string(),
            source,
        })?;
        Ok(Self { socket })
    }

    pub fn recv(&self) -> Result<Vec<u8>> {
        Ok(self.socket.recv_bytes(0)?)
    }

    pub fn poll_item(&self) -> zmq::PollItem<'_> {
        self.socket.as_poll_item(zmq::POLLIN)
    }

    /// Wake the loop that owns the bound end.
    ///
    /// Fails if the bound end is already gone, which callers on the stop
    /// path treat as "nothing left to wake".
    pub fn signal(ctx: &zmq::Context, endpoint: &str) -> Result<()> {
        let socket = ctx.socket(zmq::PAIR)?;
        socket.set_linger(0)?;
        socket
            .connect(endpoint)
            .map_err(|source| TransportError::Connect {
                role: "control",
                endpoint: endpoint.to_string(),
                source,
            })?;
        socket.send(STOP_FRAME, 0)?;
        debug!(endpoint, "stop signalled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_wakes_the_bound_end() {
        let ctx = zmq::Context::new();
        let control = ControlPair::bind(&ctx, "inproc://control-test").expect("pair should bind");
        ControlPair::signal(&ctx, "inproc://control-test").expect("signal should succeed");
        assert_eq!(control.recv().expect("stop frame"), STOP_FRAME.to_vec());
    }

    #[test]
    fn stop_frame_is_pollable() {
        let ctx = zmq::Context::new();
        let control = ControlPair::bind(&ctx, "inproc://control-poll").expect("pair should bind");
        ControlPair::signal(&ctx, "inproc://control-poll").expect("signal should succeed");

        let mut items = [control.poll_item()];
        let ready = zmq::poll(&mut items, 1000).expect("poll should succeed");
        assert_eq!(ready, 1);
        assert!(items[0].is_readable());
    }
}
