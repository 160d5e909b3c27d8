//! Offerer peer standing in for the streaming side of a session.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

use super::{HarnessError, HarnessResult};

const CANDIDATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Real offering peer connection with one sendonly video section.
pub struct OffererPeer {
    pc: Arc<RTCPeerConnection>,
    candidates: mpsc::UnboundedReceiver<RTCIceCandidateInit>,
}

impl OffererPeer {
    /// Build the peer and start gathering candidates into a queue.
    pub async fn new() -> HarnessResult<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| HarnessError::Peer(format!("Codec registration failed: {}", e)))?;
        let registry = register_default_interceptors(Default::default(), &mut media_engine)
            .map_err(|e| HarnessError::Peer(format!("Interceptor registration failed: {}", e)))?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(
            api.new_peer_connection(RTCConfiguration::default())
                .await
                .map_err(|e| HarnessError::Peer(format!("Peer connection failed: {}", e)))?,
        );

        pc.add_transceiver_from_kind(
            RTPCodecType::Video,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Sendonly,
                send_encodings: vec![],
            }),
        )
        .await
        .map_err(|e| HarnessError::Peer(format!("Transceiver failed: {}", e)))?;

        let (tx, candidates) = mpsc::unbounded_channel();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = tx.clone();
            Box::pin(async move {
                if let Some(candidate) = c {
                    if let Ok(init) = candidate.to_json() {
                        let _ = tx.send(init);
                    }
                }
            })
        }));

        Ok(Self { pc, candidates })
    }

    /// Add a sendonly audio section, forcing the next offer to renegotiate.
    pub async fn add_audio_section(&self) -> HarnessResult<()> {
        self.pc
            .add_transceiver_from_kind(
                RTPCodecType::Audio,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Sendonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .map(|_| ())
            .map_err(|e| HarnessError::Peer(format!("Transceiver failed: {}", e)))
    }

    /// Create an offer, publish it locally, and wrap it as a wire envelope.
    pub async fn offer_envelope(&self) -> HarnessResult<Value> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| HarnessError::Peer(format!("Offer failed: {}", e)))?;
        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| HarnessError::Peer(format!("Local description failed: {}", e)))?;
        let local = self
            .pc
            .local_description()
            .await
            .ok_or_else(|| HarnessError::Peer("no local description".to_string()))?;

        Ok(json!({ "sdp": { "type": "offer", "sdp": local.sdp } }))
    }

    /// Apply the viewer's answer envelope.
    pub async fn apply_answer(&self, envelope: &Value) -> HarnessResult<()> {
        let sdp = envelope["sdp"]["sdp"]
            .as_str()
            .ok_or_else(|| HarnessError::Peer("envelope carries no answer sdp".to_string()))?;
        let answer = RTCSessionDescription::answer(sdp.to_string())
            .map_err(|e| HarnessError::Peer(format!("Bad answer: {}", e)))?;
        self.pc
            .set_remote_description(answer)
            .await
            .map_err(|e| HarnessError::Peer(format!("Remote description failed: {}", e)))
    }

    /// Next locally gathered candidate as a wire envelope, or None when no
    /// candidate surfaces in time.
    pub async fn next_candidate_envelope(&mut self) -> Option<Value> {
        let init = timeout(CANDIDATE_TIMEOUT, self.candidates.recv())
            .await
            .ok()
            .flatten()?;
        Some(json!({
            "ice": {
                "candidate": init.candidate,
                "sdpMid": init.sdp_mid,
                "sdpMLineIndex": init.sdp_mline_index,
                "usernameFragment": init.username_fragment,
            }
        }))
    }

    /// Feed a viewer candidate envelope into this peer.
    pub async fn add_remote_candidate(&self, envelope: &Value) -> HarnessResult<()> {
        let ice = &envelope["ice"];
        let init = RTCIceCandidateInit {
            candidate: ice["candidate"].as_str().unwrap_or_default().to_string(),
            sdp_mid: ice["sdpMid"].as_str().map(String::from),
            sdp_mline_index: ice["sdpMLineIndex"].as_u64().map(|v| v as u16),
            username_fragment: ice["usernameFragment"].as_str().map(String::from),
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| HarnessError::Peer(format!("Candidate rejected: {}", e)))
    }

    /// Close the underlying peer connection.
    pub async fn close(&self) {
        let _ = self.pc.close().await;
    }
}
