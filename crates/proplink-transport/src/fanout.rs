use tracing::debug;

use crate::error::{Result, TransportError};

/// Server side of the notification channel. Sends never block: slow or
/// absent subscribers lose frames rather than stalling the publisher.
pub struct Publisher {
    socket: zmq::Socket,
    endpoint: String,
}

impl Publisher {
    pub fn bind(ctx: &zmq::Context, endpoint: &str) -> Result<Self> {
        let socket = ctx.socket(zmq::PUB)?;
        socket.set_linger(0)?;
        socket.bind(endpoint).map_err(|source| TransportError::Bind {
            role: "publisher",
            endpoint: endpoint.to_string(),
            source,
        })?;
        debug!(endpoint, "publisher bound");
        Ok(Self {
            socket,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn publish(&self, body: &[u8]) -> Result<()> {
        self.socket.send(body, 0)?;
        Ok(())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Client side of the notification channel; subscribes to all topics.
pub struct Subscriber {
    socket: zmq::Socket,
}

impl Subscriber {
    pub fn connect(ctx: &zmq::Context, endpoint: &str) -> Result<Self> {
        let socket = ctx.socket(zmq::SUB)?;
        socket.set_linger(0)?;
        socket.set_subscribe(b"")?;
        socket
            .connect(endpoint)
            .map_err(|source| TransportError::Connect {
                role: "subscriber",
                endpoint: endpoint.to_string(),
                source,
            })?;
        debug!(endpoint, "subscriber connected");
        Ok(Self { socket })
    }

    pub fn recv(&self) -> Result<Vec<u8>> {
        Ok(self.socket.recv_bytes(0)?)
    }

    pub fn poll_item(&self) -> zmq::PollItem<'_> {
        self.socket.as_poll_item(zmq::POLLIN)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn subscriber_receives_published_frames() {
        let ctx = zmq::Context::new();
        let publisher = Publisher::bind(&ctx, "inproc://fanout").expect("publisher should bind");
        let subscriber =
            Subscriber::connect(&ctx, "inproc://fanout").expect("subscriber should connect");

        // Give the subscription a moment to propagate.
        std::thread::sleep(Duration::from_millis(50));

        publisher.publish(b"one").expect("publish should succeed");
        publisher.publish(b"two").expect("publish should succeed");

        assert_eq!(subscriber.recv().expect("first frame"), b"one".to_vec());
        assert_eq!(subscriber.recv().expect("second frame"), b"two".to_vec());
    }

    #[test]
    fn publish_without_subscribers_does_not_block() {
        let ctx = zmq::Context::new();
        let publisher =
            Publisher::bind(&ctx, "inproc://fanout-none").expect("publisher should bind");
        publisher.publish(b"lost").expect("publish should succeed");
    }
}
