//! Control channel to the signaling peer.
//!
//! Wraps one WebSocket connection and exposes it as a stream of decoded
//! [`ChannelEvent`]s plus an envelope sink. Frames that are not valid
//! signal envelopes are logged and skipped here, at the boundary, so they
//! can never reach (or mutate) handshake state.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};
use url::Url;

use crate::credential::Credential;
use crate::signal::SignalEnvelope;
use crate::{Error, Result};

/// Role literal identifying this client to the signaling peer
pub const VIEWER_ROLE: &str = "viewer";

/// Status the signaling peer refuses unauthorized viewers with. The peer
/// rejects a bad credential before accepting the upgrade, so this arrives
/// as the HTTP status of the failed handshake; it doubles as the closure
/// code for transports that deliver it in a close frame.
pub const FORBIDDEN_CLOSE_CODE: u16 = 403;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Something the control channel delivered
#[derive(Debug)]
pub enum ChannelEvent {
    /// A decoded signal envelope, in delivery order
    Envelope(SignalEnvelope),
    /// The channel terminated; no further events follow.
    ///
    /// `code` is the peer's close code when a close frame was received,
    /// `None` when the transport ended without one.
    Closed {
        /// WebSocket close code, if the peer sent one
        code: Option<u16>,
        /// Close reason or transport error description
        reason: String,
    },
}

/// Build the viewer endpoint for a signaling base URL, with the credential
/// as the `token` query parameter
pub fn viewer_endpoint(base_url: &str, credential: &Credential) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| Error::InvalidConfig(format!("invalid signaling URL {base_url}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| Error::InvalidConfig(format!("signaling URL {base_url} cannot be a base")))?
        .pop_if_empty()
        .push("ws")
        .push(VIEWER_ROLE);
    url.query_pairs_mut()
        .append_pair("token", credential.expose());
    Ok(url)
}

/// One open control channel to the signaling peer
pub struct SignalingChannel {
    ws: WsStream,
}

impl SignalingChannel {
    /// Connect to the signaling peer's viewer endpoint.
    ///
    /// A handshake the peer refuses with HTTP 403 comes back as
    /// [`Error::Forbidden`]; any other connect failure is [`Error::Channel`].
    ///
    /// # Arguments
    ///
    /// * `base_url` - signaling base URL from configuration
    /// * `credential` - opaque token passed as the `token` query parameter
    pub async fn connect(base_url: &str, credential: &Credential) -> Result<Self> {
        let endpoint = viewer_endpoint(base_url, credential)?;
        debug!(%base_url, role = VIEWER_ROLE, "connecting to signaling peer");
        let (ws, response) = match connect_async(endpoint.as_str()).await {
            Ok(open) => open,
            Err(WsError::Http(response))
                if response.status().as_u16() == FORBIDDEN_CLOSE_CODE =>
            {
                return Err(Error::Forbidden(format!(
                    "signaling peer rejected the handshake with status {}",
                    response.status()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        debug!(status = %response.status(), "signaling channel open");
        Ok(Self { ws })
    }

    /// Receive the next channel event.
    ///
    /// Malformed frames are rejected here with a warning and the read
    /// continues; the first `Closed` event is terminal and the channel must
    /// not be polled again after it.
    pub async fn recv(&mut self) -> ChannelEvent {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(frame))) => match SignalEnvelope::decode(&frame) {
                    Ok(envelope) => return ChannelEvent::Envelope(envelope),
                    Err(e) => {
                        warn!(error = %e, "rejected malformed signal envelope");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(CloseFrame { code, reason }) => {
                            (Some(u16::from(code)), reason.to_string())
                        }
                        None => (None, String::new()),
                    };
                    debug!(?code, %reason, "signaling peer closed the channel");
                    return ChannelEvent::Closed { code, reason };
                }
                Some(Ok(other)) => {
                    // Ping/pong are handled by the transport; binary frames
                    // are not part of the protocol.
                    trace!(kind = ?other, "ignoring non-envelope frame");
                }
                Some(Err(e)) => {
                    return ChannelEvent::Closed {
                        code: None,
                        reason: e.to_string(),
                    };
                }
                None => {
                    return ChannelEvent::Closed {
                        code: None,
                        reason: "signaling stream ended".to_string(),
                    };
                }
            }
        }
    }

    /// Send one envelope to the signaling peer
    pub async fn send(&mut self, envelope: &SignalEnvelope) -> Result<()> {
        let frame = envelope.encode()?;
        self.ws.send(Message::Text(frame)).await?;
        Ok(())
    }

    /// Close the channel gracefully. Errors are ignored: the peer may
    /// already be gone.
    pub async fn close(&mut self) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        if let Err(e) = self.ws.close(Some(frame)).await {
            trace!(error = %e, "close frame not delivered");
        }
    }
}
