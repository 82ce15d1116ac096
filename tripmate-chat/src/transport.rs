use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;
use tripmate_core::{CoreError, CoreResult};
use tripmate_shared::Masked;

use crate::frame::{self, Command, Frame, Heartbeat, Inbound};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection settings for the chat broker
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ws_url: String,
    pub connect_timeout: Duration,
    /// Zero disables automatic reconnects.
    pub reconnect_delay: Duration,
    pub heartbeat_outgoing: Duration,
    pub heartbeat_incoming: Duration,
    pub access_token: Option<Masked<String>>,
}

impl TransportConfig {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_millis(5000),
            heartbeat_outgoing: Duration::from_millis(4000),
            heartbeat_incoming: Duration::from_millis(4000),
            access_token: None,
        }
    }
}

/// A STOMP session over one WebSocket connection
pub(crate) struct Link {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
    pub heartbeat: Heartbeat,
}

/// What arrived on the socket
pub(crate) enum Received {
    Frame(Frame),
    /// Heart-beat, ping, or anything else that only proves liveness
    Alive,
    Undecodable(CoreError),
    Closed(String),
}

impl Link {
    pub async fn send(&mut self, frame: &Frame) -> CoreResult<()> {
        debug!("STOMP >>> {}", frame.command.as_str());
        self.sink
            .send(Message::Text(frame.encode()))
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))
    }

    pub async fn send_heartbeat(&mut self) -> CoreResult<()> {
        self.sink
            .send(Message::Text("\n".to_string()))
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))
    }

    pub async fn receive(&mut self) -> Received {
        match self.stream.next().await {
            None => Received::Closed("connection closed".to_string()),
            Some(Err(e)) => Received::Closed(e.to_string()),
            Some(Ok(Message::Text(text))) => match frame::decode(&text) {
                Ok(Inbound::Frame(frame)) => {
                    debug!("STOMP <<< {}", frame.command.as_str());
                    Received::Frame(frame)
                }
                Ok(Inbound::Heartbeat) => Received::Alive,
                Err(e) => Received::Undecodable(e),
            },
            Some(Ok(Message::Close(close))) => Received::Closed(
                close
                    .map(|c| format!("closed by broker: {}", c.reason))
                    .unwrap_or_else(|| "closed by broker".to_string()),
            ),
            Some(Ok(_)) => Received::Alive,
        }
    }

    pub async fn close(mut self) {
        let _ = self.sink.close().await;
    }
}

/// Opens the socket and completes the CONNECT / CONNECTED handshake.
pub(crate) async fn open(config: &TransportConfig) -> CoreResult<Link> {
    tokio::time::timeout(config.connect_timeout, handshake(config))
        .await
        .map_err(|_| {
            CoreError::Transport(format!(
                "no CONNECTED from {} within {:?}",
                config.ws_url, config.connect_timeout
            ))
        })?
}

async fn handshake(config: &TransportConfig) -> CoreResult<Link> {
    let uri: Uri = config
        .ws_url
        .parse()
        .map_err(|e| CoreError::Transport(format!("bad chat url '{}': {}", config.ws_url, e)))?;
    let host = uri.host().unwrap_or("localhost").to_string();

    let (socket, _response) = tokio_tungstenite::connect_async(config.ws_url.as_str())
        .await
        .map_err(|e| CoreError::Transport(e.to_string()))?;
    let (sink, stream) = socket.split();
    let mut link = Link {
        sink,
        stream,
        heartbeat: Heartbeat {
            outgoing: Duration::ZERO,
            incoming: Duration::ZERO,
        },
    };

    let offered = (config.heartbeat_outgoing, config.heartbeat_incoming);
    let mut connect = Frame::connect(&host, offered);
    if let Some(token) = &config.access_token {
        connect = connect.header("Authorization", format!("Bearer {}", token.expose()));
    }
    link.send(&connect).await?;

    loop {
        match link.receive().await {
            Received::Frame(frame) if frame.command == Command::Connected => {
                link.heartbeat = Heartbeat::negotiate(offered, frame.get("heart-beat"));
                debug!(
                    "Negotiated heart-beats out={:?} in={:?}",
                    link.heartbeat.outgoing, link.heartbeat.incoming
                );
                return Ok(link);
            }
            Received::Frame(frame) if frame.command == Command::Error => {
                let message = frame.get("message").unwrap_or("rejected").to_string();
                return Err(CoreError::Server { status: 0, message });
            }
            Received::Frame(frame) => {
                return Err(CoreError::Protocol(format!(
                    "expected CONNECTED, got {}",
                    frame.command.as_str()
                )))
            }
            Received::Alive => continue,
            Received::Undecodable(e) => return Err(e),
            Received::Closed(reason) => return Err(CoreError::Transport(reason)),
        }
    }
}
