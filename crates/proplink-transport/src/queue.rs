use crate::error::{Result, TransportError};

/// Sending half of an intra-process handoff queue.
///
/// PUSH sockets distribute to connected PULL peers; here there is exactly
/// one, owned by a poll loop. Sends use `DONTWAIT` with an unlimited
/// high-water mark, so the only send failure is a missing peer (the loop
/// has not bound yet or has already exited).
pub struct PushQueue {
    socket: zmq::Socket,
}

impl PushQueue {
    pub fn connect(ctx: &zmq::Context, endpoint: &str) -> Result<Self> {
        let socket = ctx.socket(zmq::PUSH)?;
        socket.set_linger(0)?;
        socket.set_sndhwm(0)?;
        socket
            .connect(endpoint)
            .map_err(|source| TransportError::Connect {
                role: "push queue",
                endpoint: endpoint.to_string(),
                source,
            })?;
        Ok(Self { socket })
    }

    /// Hand a multipart message to the owning loop without blocking.
    pub fn push(&self, frames: &[&[u8]]) -> Result<()> {
        self.socket
            .send_multipart(frames.iter().copied(), zmq::DONTWAIT)?;
        Ok(())
    }
}

/// Receiving half of an intra-process handoff queue; owned by a poll loop.
pub struct PullQueue {
    socket: zmq::Socket,
}

impl PullQueue {
    pub fn bind(ctx: &zmq::Context, endpoint: &str) -> Result<Self> {
        let socket = ctx.socket(zmq::PULL)?;
        socket.set_linger(0)?;
        socket.set_rcvhwm(0)?;
        socket.bind(endpoint).map_err(|source| TransportError::Bind {
            role: "pull queue",
            endpoint: endpoint.to_string(),
            source,
        })?;
        Ok(Self { socket })
    }

    /// Drain one queued message, or `None` if the queue is empty.
    pub fn try_recv(&self) -> Result<Option<Vec<Vec<u8>>>> {
        match self.socket.recv_multipart(zmq::DONTWAIT) {
            Ok(frames) => Ok(Some(frames)),
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(source) => Err(source.into()),
        }
    }

    pub fn poll_item(&self) -> zmq::PollItem<'_> {
        self.socket.as_poll_item(zmq::POLLIN)
    }
}
