//! Embedded signaling server for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::warn;

use super::{HarnessError, HarnessResult};

const ACCEPT_TIMEOUT: Duration = Duration::from_secs(5);
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimal signaling server: accepts websocket connections on a random
/// port and hands each one to the test as a [`ServerPeer`].
pub struct TestSignalingServer {
    addr: SocketAddr,
    peers: mpsc::UnboundedReceiver<ServerPeer>,
    accept_task: JoinHandle<()>,
}

impl TestSignalingServer {
    /// Bind a random loopback port and start accepting connections.
    pub async fn spawn() -> HarnessResult<Self> {
        Self::spawn_inner(None).await
    }

    /// Bind a random loopback port and refuse every websocket handshake
    /// with the given HTTP status instead of accepting the upgrade.
    pub async fn spawn_rejecting(status: u16) -> HarnessResult<Self> {
        Self::spawn_inner(Some(status)).await
    }

    async fn spawn_inner(reject_status: Option<u16>) -> HarnessResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (peer_tx, peers) = mpsc::unbounded_channel();

        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let peer_tx = peer_tx.clone();
                tokio::spawn(async move {
                    match accept_peer(stream, reject_status).await {
                        Ok(peer) => {
                            let _ = peer_tx.send(peer);
                        }
                        Err(e) => {
                            // In rejecting mode a failed handshake is the
                            // expected outcome, not worth a warning.
                            if reject_status.is_none() {
                                warn!("Test server handshake failed: {}", e);
                            }
                        }
                    }
                });
            }
        });

        Ok(Self {
            addr,
            peers,
            accept_task,
        })
    }

    /// Base URL clients should connect to.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Wait for the next accepted websocket connection.
    pub async fn next_peer(&mut self) -> HarnessResult<ServerPeer> {
        match timeout(ACCEPT_TIMEOUT, self.peers.recv()).await {
            Ok(Some(peer)) => Ok(peer),
            Ok(None) => Err(HarnessError::Server("accept loop stopped".to_string())),
            Err(_) => Err(HarnessError::Timeout(
                "no websocket connection arrived".to_string(),
            )),
        }
    }
}

impl Drop for TestSignalingServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_peer(stream: TcpStream, reject_status: Option<u16>) -> HarnessResult<ServerPeer> {
    let (uri_tx, uri_rx) = oneshot::channel();
    let ws = accept_hdr_async(stream, move |req: &Request, resp: Response| {
        let _ = uri_tx.send(req.uri().to_string());
        match reject_status {
            Some(status) => Err(refusal_response(status)),
            None => Ok(resp),
        }
    })
    .await
    .map_err(|e| HarnessError::Server(format!("Handshake failed: {}", e)))?;

    let uri = uri_rx.await.unwrap_or_default();
    Ok(ServerPeer { uri, ws })
}

fn refusal_response(status: u16) -> ErrorResponse {
    Response::builder()
        .status(status)
        .body(Some("credential rejected".to_string()))
        .expect("refusal response must build")
}

/// One accepted viewer connection, driven directly by the test.
pub struct ServerPeer {
    uri: String,
    ws: WebSocketStream<TcpStream>,
}

impl ServerPeer {
    /// Request URI of the websocket handshake (path and query).
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Send one JSON text frame.
    pub async fn send_json(&mut self, value: &serde_json::Value) -> HarnessResult<()> {
        self.send_text(&value.to_string()).await
    }

    /// Send one raw text frame.
    pub async fn send_text(&mut self, text: &str) -> HarnessResult<()> {
        self.ws
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| HarnessError::Peer(format!("Send failed: {}", e)))
    }

    /// Wait for the next JSON text frame.
    pub async fn recv_json(&mut self) -> HarnessResult<serde_json::Value> {
        loop {
            match timeout(RECV_TIMEOUT, self.ws.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    return serde_json::from_str(&text)
                        .map_err(|e| HarnessError::Peer(format!("Bad frame: {}", e)));
                }
                Ok(Some(Ok(Message::Close(_)))) => {
                    return Err(HarnessError::Peer("connection closed".to_string()));
                }
                Ok(Some(Ok(_))) => continue,
                Ok(Some(Err(e))) => {
                    return Err(HarnessError::Peer(format!("Receive failed: {}", e)));
                }
                Ok(None) => return Err(HarnessError::Peer("connection ended".to_string())),
                Err(_) => return Err(HarnessError::Timeout("no frame arrived".to_string())),
            }
        }
    }

    /// Next description envelope, skipping candidate frames.
    pub async fn recv_description(&mut self) -> HarnessResult<serde_json::Value> {
        loop {
            let frame = self.recv_json().await?;
            if frame.get("sdp").is_some() {
                return Ok(frame);
            }
        }
    }

    /// Next candidate envelope, skipping description frames.
    pub async fn recv_candidate(&mut self) -> HarnessResult<serde_json::Value> {
        loop {
            let frame = self.recv_json().await?;
            if frame.get("ice").is_some() {
                return Ok(frame);
            }
        }
    }

    /// Wait for the viewer's close frame, skipping data frames before it.
    /// Returns the close code and reason when a close frame was sent.
    pub async fn expect_close(&mut self) -> HarnessResult<Option<(u16, String)>> {
        loop {
            match timeout(RECV_TIMEOUT, self.ws.next()).await {
                Ok(Some(Ok(Message::Close(frame)))) => {
                    return Ok(frame.map(|f| (u16::from(f.code), f.reason.into_owned())));
                }
                Ok(Some(Ok(_))) => continue,
                Ok(Some(Err(_))) | Ok(None) => return Ok(None),
                Err(_) => return Err(HarnessError::Timeout("no close arrived".to_string())),
            }
        }
    }

    /// Close the connection with an explicit code, then drain until the
    /// closing handshake completes.
    pub async fn close_with(mut self, code: u16, reason: &str) -> HarnessResult<()> {
        self.ws
            .close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: reason.to_string().into(),
            }))
            .await
            .map_err(|e| HarnessError::Peer(format!("Close failed: {}", e)))?;

        while let Ok(Some(Ok(_))) = timeout(Duration::from_secs(1), self.ws.next()).await {}
        Ok(())
    }
}
