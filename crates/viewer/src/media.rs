//! WebRTC media session for a single connection attempt.
//!
//! Wraps an [`RTCPeerConnection`] configured with the STUN and TURN servers
//! from [`ViewerConfig`]. The viewer is strictly the answering side: the
//! remote peer offers its tracks, the session answers, and inbound media is
//! handed to the [`PresentationShell`]. No local tracks are published and no
//! transceivers are added up front; the media sections come from the remote
//! offer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use crate::config::ViewerConfig;
use crate::error::{Error, Result};
use crate::shell::PresentationShell;
use crate::signal::{DescriptionKind, IceCandidate, SessionDescription};

/// Media side of one connection attempt.
///
/// Created when the attempt starts and closed exactly once when the attempt
/// ends, whichever side ends it.
pub struct MediaSession {
    attempt: Uuid,
    pc: Arc<RTCPeerConnection>,
}

impl MediaSession {
    /// Create a peer connection configured from `config`.
    #[instrument(skip(config), fields(attempt = %attempt))]
    pub async fn new(config: &ViewerConfig, attempt: Uuid) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::Media(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine)
                .map_err(|e| Error::Media(format!("Failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .chain(config.turn_servers.iter().map(|turn| {
                #[allow(clippy::needless_update)]
                RTCIceServer {
                    urls: vec![turn.url.clone()],
                    username: turn.username.clone(),
                    credential: turn.credential.clone(),
                    ..Default::default()
                }
            }))
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let pc = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(|e| Error::Media(format!("Failed to create peer connection: {}", e)))?,
        );

        // Transport faults are logged, never acted on. Only signaling
        // closure or an explicit close ends the attempt.
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            Box::pin(async move {
                if s == RTCPeerConnectionState::Failed {
                    warn!("Media transport failed for attempt {}", attempt);
                } else {
                    debug!("Media transport state for attempt {}: {}", attempt, s);
                }
            })
        }));

        debug!("Created media session for attempt {}", attempt);

        Ok(Self { attempt, pc })
    }

    /// Forward locally gathered ICE candidates to `outbound`.
    ///
    /// Gathering can outlive the signaling channel. Once the receiving side
    /// is gone, candidates are dropped without notice.
    pub fn forward_candidates(&self, outbound: mpsc::UnboundedSender<IceCandidate>) {
        let attempt = self.attempt;
        self.pc
            .on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
                let outbound = outbound.clone();
                Box::pin(async move {
                    let candidate = match c {
                        Some(candidate) => candidate,
                        None => {
                            trace!("ICE gathering complete for attempt {}", attempt);
                            return;
                        }
                    };

                    match candidate.to_json() {
                        Ok(init) => {
                            let candidate = IceCandidate {
                                candidate: init.candidate,
                                sdp_mid: init.sdp_mid,
                                sdp_mline_index: init.sdp_mline_index,
                                username_fragment: init.username_fragment,
                            };
                            if outbound.send(candidate).is_err() {
                                trace!("Dropping local candidate for attempt {}", attempt);
                            }
                        }
                        Err(e) => {
                            warn!(
                                "Failed to serialize local candidate for attempt {}: {}",
                                attempt, e
                            );
                        }
                    }
                })
            }));
    }

    /// Hand every inbound remote track to the presentation shell.
    pub fn deliver_tracks(&self, shell: Arc<dyn PresentationShell>) {
        let attempt = self.attempt;
        self.pc
            .on_track(Box::new(move |track, _receiver, _transceiver| {
                let shell = Arc::clone(&shell);
                Box::pin(async move {
                    info!(
                        "Remote track for attempt {}: kind={} ssrc={}",
                        attempt,
                        track.kind(),
                        track.ssrc()
                    );
                    shell.show_track(track).await;
                })
            }));
    }

    /// Apply a remote session description received over signaling.
    ///
    /// Both kinds are accepted whenever they arrive. A description the media
    /// layer rejects surfaces as [`Error::Sdp`].
    pub async fn apply_remote(&self, description: &SessionDescription) -> Result<()> {
        debug!(
            "Applying remote {} for attempt {}",
            description.kind, self.attempt
        );

        let remote = match description.kind {
            DescriptionKind::Offer => RTCSessionDescription::offer(description.sdp.clone()),
            DescriptionKind::Answer => RTCSessionDescription::answer(description.sdp.clone()),
        }
        .map_err(|e| Error::Sdp(format!("Failed to parse remote description: {}", e)))?;

        self.pc
            .set_remote_description(remote)
            .await
            .map_err(|e| Error::Sdp(format!("Failed to set remote description: {}", e)))?;

        Ok(())
    }

    /// Produce the local answer for the current remote offer.
    ///
    /// The returned description is read back from the peer connection after
    /// `set_local_description`, so it reflects what the media layer actually
    /// negotiated rather than the unmodified `create_answer` output.
    pub async fn answer(&self) -> Result<SessionDescription> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| Error::Sdp(format!("Failed to create answer: {}", e)))?;

        self.pc
            .set_local_description(answer)
            .await
            .map_err(|e| Error::Sdp(format!("Failed to set local description: {}", e)))?;

        let local = self
            .pc
            .local_description()
            .await
            .ok_or_else(|| Error::Sdp("No local description after setting answer".to_string()))?;

        debug!("Created answer for attempt {}", self.attempt);

        Ok(SessionDescription::answer(local.sdp))
    }

    /// Submit a remote ICE candidate to the media layer.
    ///
    /// Candidates are neither buffered nor reordered. One that arrives
    /// before any remote description is rejected by the media layer and the
    /// rejection is returned as is.
    pub async fn submit_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        trace!(
            "Submitting remote candidate for attempt {}: {}",
            self.attempt,
            candidate.candidate
        );

        let init = RTCIceCandidateInit {
            candidate: candidate.candidate.clone(),
            sdp_mid: candidate.sdp_mid.clone(),
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment.clone(),
        };

        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| Error::Candidate(format!("Failed to add ICE candidate: {}", e)))?;

        Ok(())
    }

    /// Close the peer connection. Closing an already closed session is a
    /// no-op.
    pub async fn close(&self) -> Result<()> {
        debug!("Closing media session for attempt {}", self.attempt);
        self.pc
            .close()
            .await
            .map_err(|e| Error::Media(format!("Failed to close peer connection: {}", e)))?;
        Ok(())
    }
}
