//! Configuration types for the viewer connection core

use serde::{Deserialize, Serialize};

/// Main configuration for a [`ConnectionCoordinator`](crate::ConnectionCoordinator)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Signaling server base URL (ws:// or wss://); the viewer endpoint
    /// path and credential query parameter are appended at connect time
    pub signaling_url: String,

    /// STUN server URLs (at least one required)
    pub stun_servers: Vec<String>,

    /// TURN server configurations (optional)
    pub turn_servers: Vec<TurnServerConfig>,
}

/// TURN server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnServerConfig {
    /// TURN server URL (turn:// or turns://)
    pub url: String,

    /// Username for TURN authentication
    pub username: String,

    /// Credential for TURN authentication
    pub credential: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://localhost:8000".to_string(),
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            turn_servers: Vec::new(),
        }
    }
}

impl ViewerConfig {
    /// Create a configuration for the given signaling base URL with the
    /// default STUN server
    ///
    /// # Example
    ///
    /// ```
    /// use farview_viewer::config::ViewerConfig;
    ///
    /// let config = ViewerConfig::new("ws://stream.example.com:8000");
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new(signaling_url: &str) -> Self {
        Self {
            signaling_url: signaling_url.to_string(),
            ..Self::default()
        }
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `stun_servers` is empty
    /// - `signaling_url` is not a valid WebSocket URL
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        // Validate STUN servers
        if self.stun_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one STUN server is required".to_string(),
            ));
        }

        // Validate signaling URL
        if !self.signaling_url.starts_with("ws://") && !self.signaling_url.starts_with("wss://") {
            return Err(Error::InvalidConfig(format!(
                "signaling_url must start with ws:// or wss://, got {}",
                self.signaling_url
            )));
        }

        Ok(())
    }

    /// Replace the STUN server list with a single server
    ///
    /// Useful for chaining with `new()`.
    pub fn with_stun_server(mut self, stun_server: &str) -> Self {
        self.stun_servers = vec![stun_server.to_string()];
        self
    }

    /// Replace the STUN server list
    ///
    /// Useful for chaining with `new()`.
    pub fn with_stun_servers(mut self, stun_servers: Vec<String>) -> Self {
        self.stun_servers = stun_servers;
        self
    }

    /// Add TURN servers to this configuration
    ///
    /// # Example
    ///
    /// ```
    /// use farview_viewer::config::{TurnServerConfig, ViewerConfig};
    ///
    /// let config = ViewerConfig::new("ws://stream.example.com:8000")
    ///     .with_turn_servers(vec![TurnServerConfig {
    ///         url: "turn:turn.example.com:3478".to_string(),
    ///         username: "user".to_string(),
    ///         credential: "pass".to_string(),
    ///     }]);
    /// assert_eq!(config.turn_servers.len(), 1);
    /// ```
    pub fn with_turn_servers(mut self, turn_servers: Vec<TurnServerConfig>) -> Self {
        self.turn_servers = turn_servers;
        self
    }
}
