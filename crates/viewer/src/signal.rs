//! Wire protocol for the signaling channel.
//!
//! Every frame on the channel is one JSON-encoded [`SignalEnvelope`]: either
//! a session description under the `"sdp"` key or an ICE candidate under the
//! `"ice"` key, never both, never neither. Decoding is strict at this
//! boundary so downstream handshake logic never inspects raw JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// One signaling frame: a description or a candidate, exactly one per
/// envelope.
///
/// The externally tagged representation matches the wire shape:
/// `{"sdp": {...}}` or `{"ice": {...}}`. Envelopes with no recognized key,
/// an unknown key, or more than one key fail to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalEnvelope {
    /// An offer or answer session description
    #[serde(rename = "sdp")]
    Description(SessionDescription),
    /// A transport-reachability hint for the media path
    #[serde(rename = "ice")]
    Candidate(IceCandidate),
}

impl SignalEnvelope {
    /// Decode a single wire frame, rejecting anything that is not exactly
    /// one description or one candidate
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Envelope(e.to_string()))
    }

    /// Encode this envelope as a wire frame
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Envelope(e.to_string()))
    }
}

/// A session description in the offer/answer exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Which role this description plays in the handshake
    #[serde(rename = "type")]
    pub kind: DescriptionKind,
    /// The SDP body
    pub sdp: String,
}

impl SessionDescription {
    /// Construct an answer description
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: DescriptionKind::Answer,
            sdp: sdp.into(),
        }
    }

    /// Construct an offer description
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: DescriptionKind::Offer,
            sdp: sdp.into(),
        }
    }
}

/// The two description roles this client understands.
///
/// The viewer is always the answerer: it replies to offers and applies
/// answers, but other description types on the wire are a decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionKind {
    /// Remote side initiates negotiation
    Offer,
    /// Reply completing a negotiation round
    Answer,
}

impl fmt::Display for DescriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptionKind::Offer => f.write_str("offer"),
            DescriptionKind::Answer => f.write_str("answer"),
        }
    }
}

/// An ICE candidate as exchanged on the wire.
///
/// Field names follow the browser candidate JSON; fields beyond these four
/// are ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    /// The candidate attribute line
    pub candidate: String,
    /// Media stream identification tag, if present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    /// Index of the media description this candidate belongs to
    #[serde(
        default,
        rename = "sdpMLineIndex",
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
    /// ICE username fragment, if present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}
