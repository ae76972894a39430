//! Websocket channel connection and handshake.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jut_client::{ChannelConnector, TokenManager};
//!
//! # async fn example(tokens: Arc<TokenManager>) -> Result<(), jut_client::ClientError> {
//! let channel = ChannelConnector::default()
//!     .connect("https://data.example.com", &tokens, None)
//!     .await?;
//! println!("channel {}", channel.channel_id());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use jut_proto::{parse_handshake_reply, ClientFrame, HandshakeReply};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;

use crate::error::ClientError;
use crate::token::TokenManager;

/// Socket type used for channels.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Channel endpoint relative to a data URL.
pub const CHANNEL_PATH: &str = "/api/v1/juttle/channel";

/// Time allowed for the `channel_id` reply.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed to establish the TCP/TLS/websocket connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// An open socket whose handshake succeeded.
pub struct Channel {
    ws: WsStream,
    channel_id: String,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("channel_id", &self.channel_id)
            .finish_non_exhaustive()
    }
}

impl Channel {
    /// Identifier assigned by the service.
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Split into the socket and the channel id.
    #[must_use]
    pub fn into_parts(self) -> (WsStream, String) {
        (self.ws, self.channel_id)
    }
}

/// Opens channel sockets and performs the handshake.
#[derive(Debug, Clone)]
pub struct ChannelConnector {
    connect_timeout: Duration,
    handshake_timeout: Duration,
}

impl Default for ChannelConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl ChannelConnector {
    /// Set the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the handshake reply timeout.
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Rewrite a data URL into its channel websocket URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for unparsable URLs or unsupported
    /// schemes.
    pub fn channel_url(data_url: &str) -> Result<String, ClientError> {
        let mut url = Url::parse(data_url)
            .map_err(|e| ClientError::Config(format!("invalid data url {data_url}: {e}")))?;

        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(ClientError::Config(format!(
                    "invalid data url {data_url}: unsupported scheme {other}"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| ClientError::Config(format!("invalid data url {data_url}")))?;

        Ok(format!("{}{CHANNEL_PATH}", url.as_str().trim_end_matches('/')))
    }

    /// Connect and handshake, optionally attaching to `job_id`.
    ///
    /// The handshake frame is the first frame written; the socket is only
    /// returned once a `channel_id` has been parsed.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Transport`] for refused, reset or timed out sockets
    /// - [`ClientError::Protocol`] for a malformed reply
    /// - [`ClientError::JobNotFound`] if the attach target is gone
    pub async fn connect(
        &self,
        data_url: &str,
        tokens: &TokenManager,
        job_id: Option<&str>,
    ) -> Result<Channel, ClientError> {
        let url = Self::channel_url(data_url)?;
        let credential = tokens.get_credential().await?;

        debug!(url = %url, job_id = ?job_id, "connecting to channel");
        let (mut ws, _response) = timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| ClientError::Transport(format!("connection to {url} timed out")))??;

        let hello = ClientFrame::handshake(credential.token(), job_id.map(str::to_string));
        send_frame(&mut ws, &hello).await?;

        let reply = timeout(self.handshake_timeout, read_text(&mut ws))
            .await
            .map_err(|_| ClientError::Transport("timed out waiting for channel id".into()))??;

        match parse_handshake_reply(&reply)? {
            HandshakeReply::Assigned { channel_id } => {
                debug!(channel_id = %channel_id, "channel assigned");
                Ok(Channel { ws, channel_id })
            }
            HandshakeReply::JobMissing => Err(ClientError::JobNotFound(
                job_id.unwrap_or_default().to_string(),
            )),
        }
    }
}

/// Write one frame.
pub(crate) async fn send_frame(ws: &mut WsStream, frame: &ClientFrame) -> Result<(), ClientError> {
    let json = frame.to_json()?;
    trace!(kind = frame.kind(), "sending frame");
    ws.send(Message::Text(json.into()))
        .await
        .map_err(|e| ClientError::Transport(format!("failed to send {}: {e}", frame.kind())))
}

/// Read the next text frame, skipping websocket-level control frames.
pub(crate) async fn read_text(ws: &mut WsStream) -> Result<String, ClientError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
            Some(Ok(Message::Binary(_))) => {
                return Err(ClientError::Protocol("unexpected binary frame".into()));
            }
            Some(Ok(Message::Close(_))) => {
                return Err(ClientError::Transport("channel closed by server".into()));
            }
            Some(Err(e)) => return Err(ClientError::Transport(format!("websocket error: {e}"))),
            None => return Err(ClientError::Transport("channel connection closed".into())),
        }
    }
}
