//! Websocket connection to the macrodeck server.

use crate::error::ChannelError;
use crate::protocol::Outbound;
use std::io::ErrorKind;
use std::net::TcpStream;
use tracing::{debug, info, warn};
use tungstenite::{connect, stream::MaybeTlsStream, Message, WebSocket};

/// Send-only side of the channel. Sends are fire-and-forget.
pub trait FrameSink {
    fn send(&mut self, frame: Outbound);
}

impl FrameSink for Vec<Outbound> {
    fn send(&mut self, frame: Outbound) {
        self.push(frame);
    }
}

/// Where the server lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl ServerAddress {
    pub fn websocket_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}/ws", scheme, self.host, self.port)
    }

    /// Base for `/icon/<macro>` lookups
    pub fn http_base(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

pub struct WsChannel {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
    url: String,
}

impl WsChannel {
    pub fn connect(address: &ServerAddress) -> Result<Self, ChannelError> {
        let url = address.websocket_url();
        let (mut socket, _) = connect(url.as_str()).map_err(|source| ChannelError::Connect {
            url: url.clone(),
            source,
        })?;

        // Reads are polled from the UI loop
        match socket.get_mut() {
            MaybeTlsStream::Plain(stream) => stream.set_nonblocking(true)?,
            MaybeTlsStream::NativeTls(stream) => stream.get_mut().set_nonblocking(true)?,
            _ => {}
        }

        info!("Connected to {}", url);
        Ok(Self { socket, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Drain every text frame that is ready, in arrival order.
    ///
    /// Frames read before a failure are returned alongside it so none are lost.
    pub fn poll(&mut self) -> (Vec<String>, Option<ChannelError>) {
        let mut frames = Vec::new();
        loop {
            match self.socket.read() {
                Ok(Message::Text(text)) => frames.push(text),
                Ok(Message::Close(_)) => return (frames, Some(ChannelError::Closed)),
                Ok(_) => continue,
                Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => break,
                Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                    return (frames, Some(ChannelError::Closed));
                }
                Err(e) => return (frames, Some(ChannelError::Socket(e))),
            }
        }
        (frames, None)
    }
}

impl FrameSink for WsChannel {
    fn send(&mut self, frame: Outbound) {
        let text = frame.to_string();
        match self.socket.send(Message::Text(text)) {
            Ok(()) => debug!("Sent {}", frame),
            // Queued in the write buffer; flushed by the next read or send
            Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => {
                debug!("Queued {}", frame)
            }
            Err(e) => warn!("Could not send {} to {}: {}", frame, self.url, e),
        }
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}
