//! Error types for the viewer connection core

/// Result type alias using the viewer Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while coordinating a viewer connection
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Signaling channel error (connect, send, or transport failure)
    #[error("Signaling channel error: {0}")]
    Channel(String),

    /// The signaling peer refused authorization for this credential
    #[error("Connection forbidden: {0}")]
    Forbidden(String),

    /// Inbound or outbound signal envelope could not be decoded/encoded
    #[error("Signal envelope error: {0}")]
    Envelope(String),

    /// SDP description could not be applied or produced
    #[error("SDP error: {0}")]
    Sdp(String),

    /// ICE candidate could not be submitted or serialized
    #[error("ICE candidate error: {0}")]
    Candidate(String),

    /// Media session (peer connection) error
    #[error("Media session error: {0}")]
    Media(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }

    /// Check if this error came from the signaling channel
    pub fn is_channel_error(&self) -> bool {
        matches!(
            self,
            Error::Channel(_) | Error::Forbidden(_) | Error::Envelope(_) | Error::IoError(_)
        )
    }

    /// Check if this error is an authorization refusal from the signaling peer
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Forbidden(_))
    }

    /// Check if this error came from the media session
    pub fn is_media_error(&self) -> bool {
        matches!(self, Error::Media(_) | Error::Sdp(_) | Error::Candidate(_))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Channel(err.to_string())
    }
}

impl From<webrtc::Error> for Error {
    fn from(err: webrtc::Error) -> Self {
        Error::Media(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Envelope(err.to_string())
    }
}
