//! Presentation shell seam.
//!
//! The coordinator pushes inbound tracks and user-facing connection notices
//! through this trait; status changes flow separately through the watch
//! channel returned by
//! [`ConnectionCoordinator::watch_status`](crate::ConnectionCoordinator::watch_status).

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use webrtc::track::track_remote::TrackRemote;

use crate::channel::FORBIDDEN_CLOSE_CODE;

/// Receiver of inbound media and user-facing connection notices.
///
/// Implementations must return promptly: long-running track consumption
/// belongs in a spawned task, not inside `show_track` itself, or later
/// tracks and notices will be delayed behind it.
#[async_trait]
pub trait PresentationShell: Send + Sync {
    /// Hand an inbound remote track to the display sink. One-way, no
    /// acknowledgment.
    async fn show_track(&self, track: Arc<TrackRemote>);

    /// Surface a user-facing connection notice
    async fn notify(&self, notice: ConnectionNotice);
}

/// User-facing message emitted when the control channel terminates.
///
/// Teardown is identical for every variant; the notice only changes what
/// the user is told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionNotice {
    /// The signaling peer refused the connection with status 403, either by
    /// rejecting the handshake or in a close frame
    Forbidden,
    /// Any other channel termination, with the raw close code and reason
    ChannelClosed {
        /// Close code from the peer, if one was sent
        code: Option<u16>,
        /// Close reason or transport error description
        reason: String,
    },
}

impl ConnectionNotice {
    /// Classify a channel closure into the notice shown to the user
    pub fn from_closure(code: Option<u16>, reason: String) -> Self {
        if code == Some(FORBIDDEN_CLOSE_CODE) {
            ConnectionNotice::Forbidden
        } else {
            ConnectionNotice::ChannelClosed { code, reason }
        }
    }
}

impl fmt::Display for ConnectionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionNotice::Forbidden => {
                f.write_str("Connection forbidden: you do not have permission to connect.")
            }
            ConnectionNotice::ChannelClosed {
                code: Some(code),
                reason,
            } => write!(f, "Connection closed with code: {code} ({reason})"),
            ConnectionNotice::ChannelClosed { code: None, reason } => {
                write!(f, "Connection closed unexpectedly ({reason})")
            }
        }
    }
}
