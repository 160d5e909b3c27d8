//! Viewer-side connection coordination for Farview streams
//!
//! This crate connects a viewer to a signaling server, answers the remote
//! peer's WebRTC offer, and hands the resulting media tracks to a pluggable
//! presentation shell.
//!
//! # Features
//!
//! - **Single-attempt lifecycle**: at most one connection attempt at a time,
//!   no automatic retry
//! - **Answerer-only negotiation**: the remote peer offers, the viewer
//!   answers; renegotiation offers are answered the same way
//! - **Verbatim candidate relay**: ICE candidates cross the wire in arrival
//!   order, without buffering or reordering
//! - **Status watch**: `disconnected` / `connecting` / `connected`
//!   transitions observable through a watch channel
//! - **Pluggable presentation**: tracks and closure notices go to a
//!   [`PresentationShell`] implementation
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │  PresentationShell (terminal, UI, tests)               │
//! │    ↑ tracks, notices            ↓ open / close         │
//! │  ConnectionCoordinator                                 │
//! │  ├─ status watch                                       │
//! │  └─ relay task (one per attempt)                       │
//! │      ├─ SignalingChannel (JSON envelopes / WebSocket)  │
//! │      └─ MediaSession (RTCPeerConnection, answerer)     │
//! │          ↓                                             │
//! │  signaling server /ws/viewer ↔ remote streaming peer   │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use farview_viewer::{
//!     ConnectionCoordinator, CredentialSource, EnvCredentialSource, ViewerConfig,
//! };
//!
//! let config = ViewerConfig::new("wss://farview.example.com");
//! let coordinator = ConnectionCoordinator::new(config, Arc::new(MyShell::new()))?;
//!
//! let credential = EnvCredentialSource::new("FARVIEW_TOKEN")
//!     .get()
//!     .expect("FARVIEW_TOKEN not set");
//! coordinator.open(credential).await;
//!
//! // ... watch status, receive tracks ...
//!
//! coordinator.close().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod config;
pub mod coordinator;
pub mod credential;
pub mod error;
pub mod shell;
pub mod signal;

// Internal modules
mod channel;
mod media;

// Re-exports for public API
pub use config::{TurnServerConfig, ViewerConfig};
pub use coordinator::{ConnectionCoordinator, ConnectionStatus};
pub use credential::{Credential, CredentialSource, EnvCredentialSource};
pub use error::{Error, Result};
pub use shell::{ConnectionNotice, PresentationShell};
pub use signal::{DescriptionKind, IceCandidate, SessionDescription, SignalEnvelope};

// Shell implementations receive this track handle.
pub use webrtc::track::track_remote::TrackRemote;

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
