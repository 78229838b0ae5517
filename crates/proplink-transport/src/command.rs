use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// A request as seen by the router: opaque peer identity, the empty
/// delimiter frame, and the body.
///
/// The identity and delimiter are echoed verbatim in the reply; they are
/// never parsed.
#[derive(Debug, Clone)]
pub struct RoutedMessage {
    pub identity: Vec<u8>,
    pub delimiter: Vec<u8>,
    pub body: Vec<u8>,
}

/// Server side of the command channel.
///
/// Binds one endpoint; replies return to the originating peer via the
/// identity frame. Sends must stay on the thread that owns the socket.
pub struct Router {
    socket: zmq::Socket,
    endpoint: String,
}

impl Router {
    pub fn bind(ctx: &zmq::Context, endpoint: &str) -> Result<Self> {
        let socket = ctx.socket(zmq::ROUTER)?;
        socket.set_linger(0)?;
        socket.bind(endpoint).map_err(|source| TransportError::Bind {
            role: "router",
            endpoint: endpoint.to_string(),
            source,
        })?;
        debug!(endpoint, "router bound");
        Ok(Self {
            socket,
            endpoint: endpoint.to_string(),
        })
    }

    /// Receive one `{identity, delimiter, body}` request.
    pub fn recv(&self) -> Result<RoutedMessage> {
        let frames = self.socket.recv_multipart(0)?;
        let [identity, delimiter, body]: [Vec<u8>; 3] =
            frames.try_into().map_err(|frames: Vec<Vec<u8>>| {
                TransportError::Malformed {
                    frames: frames.len(),
                    expected: 3,
                }
            })?;
        Ok(RoutedMessage {
            identity,
            delimiter,
            body,
        })
    }

    /// Send a `{identity, delimiter, body}` reply back to a peer.
    pub fn send(&self, identity: &[u8], delimiter: &[u8], body: &[u8]) -> Result<()> {
        self.socket.send_multipart([identity, delimiter, body], 0)?;
        Ok(())
    }

    pub fn poll_item(&self) -> zmq::PollItem<'_> {
        self.socket.as_poll_item(zmq::POLLIN)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Client side of the command channel.
///
/// Connects to a router; may have many requests in flight. A configured
/// timeout applies to both send and receive.
pub struct Dealer {
    socket: zmq::Socket,
}

impl Dealer {
    pub fn connect(ctx: &zmq::Context, endpoint: &str, timeout: Option<Duration>) -> Result<Self> {
        let socket = ctx.socket(zmq::DEALER)?;
        socket.set_linger(0)?;
        let ms = timeout.map_or(-1, |t| t.as_millis() as i32);
        socket.set_rcvtimeo(ms)?;
        socket.set_sndtimeo(ms)?;
        socket
            .connect(endpoint)
            .map_err(|source| TransportError::Connect {
                role: "dealer",
                endpoint: endpoint.to_string(),
                source,
            })?;
        debug!(endpoint, "dealer connected");
        Ok(Self { socket })
    }

    /// Send a request body as `{delimiter, body}`; the router strips the
    /// delimiter and prepends this peer's identity.
    pub fn send(&self, body: &[u8]) -> Result<()> {
        self.socket.send_multipart([&[][..], body], 0)?;
        Ok(())
    }

    /// Receive one `{delimiter, body}` reply and return the body.
    pub fn recv(&self) -> Result<Vec<u8>> {
        let frames = self.socket.recv_multipart(0)?;
        let [_delimiter, body]: [Vec<u8>; 2] =
            frames.try_into().map_err(|frames: Vec<Vec<u8>>| {
                TransportError::Malformed {
                    frames: frames.len(),
                    expected: 2,
                }
            })?;
        Ok(body)
    }

    pub fn poll_item(&self) -> zmq::PollItem<'_> {
        self.socket.as_poll_item(zmq::POLLIN)
    }
}
