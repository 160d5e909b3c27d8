//! Connection coordinator for the viewer.
//!
//! The coordinator owns at most one connection attempt at a time. Opening
//! starts an attempt: a media session is created, the signaling channel is
//! dialed, and a relay task shuttles envelopes between the two until the
//! channel closes or the user closes the connection. There is no automatic
//! retry; every attempt ends in `Disconnected` and stays there until the
//! next explicit open.
//!
//! Teardown is owned by whichever path removes the attempt from the slot
//! first, so the media session and relay are torn down exactly once even
//! when a remote closure races a local close.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::channel::{ChannelEvent, SignalingChannel, FORBIDDEN_CLOSE_CODE};
use crate::config::ViewerConfig;
use crate::credential::Credential;
use crate::error::Result;
use crate::media::MediaSession;
use crate::shell::{ConnectionNotice, PresentationShell};
use crate::signal::{DescriptionKind, IceCandidate, SignalEnvelope};

/// How long `close` waits for the relay task to stop.
const RELAY_STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// Externally visible lifecycle of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No attempt in progress.
    #[default]
    Disconnected,
    /// An attempt has started; the signaling channel is being dialed.
    Connecting,
    /// The signaling channel is open and envelopes are being relayed.
    Connected,
}

impl ConnectionStatus {
    /// Whether a shell should offer the open control in this status.
    pub fn can_open(&self) -> bool {
        matches!(self, ConnectionStatus::Disconnected)
    }

    /// Whether a shell should offer the close control in this status.
    ///
    /// Advisory only. [`ConnectionCoordinator::close`] itself is safe in
    /// every status.
    pub fn can_close(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        };
        write!(f, "{}", label)
    }
}

/// Everything a live attempt owns. Removed from the slot exactly once.
struct ConnectionHandle {
    attempt: Uuid,
    session: Arc<MediaSession>,
    shutdown: broadcast::Sender<()>,
    relay: JoinHandle<()>,
}

struct Shared {
    config: ViewerConfig,
    shell: Arc<dyn PresentationShell>,
    status: watch::Sender<ConnectionStatus>,
    /// Slot for the active attempt. Status writes happen under this lock
    /// so a concurrent open cannot interleave with a teardown.
    active: Mutex<Option<ConnectionHandle>>,
}

impl Shared {
    fn set_status(&self, status: ConnectionStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            debug!("Connection status: {}", status);
        }
    }
}

/// Coordinates viewer connection attempts against a signaling server.
///
/// Cloning is cheap and every clone drives the same underlying attempt
/// slot, so a shell can hold one clone for input handling and another for
/// status display.
#[derive(Clone)]
pub struct ConnectionCoordinator {
    inner: Arc<Shared>,
}

impl ConnectionCoordinator {
    /// Create a coordinator for `config`, reporting tracks and notices to
    /// `shell`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfig`] when the configuration fails
    /// validation.
    pub fn new(config: ViewerConfig, shell: Arc<dyn PresentationShell>) -> Result<Self> {
        config.validate()?;
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Ok(Self {
            inner: Arc::new(Shared {
                config,
                shell,
                status,
                active: Mutex::new(None),
            }),
        })
    }

    /// Current status.
    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    /// Subscribe to status transitions.
    ///
    /// The receiver observes the latest value only; rapid transitions may
    /// coalesce.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Start a connection attempt authenticated with `credential`.
    ///
    /// A no-op when an attempt is already active. Failures after this call
    /// returns are reported through the status watch and the shell; a
    /// failed attempt settles in `Disconnected` without retrying.
    pub async fn open(&self, credential: Credential) {
        let mut active = self.inner.active.lock().await;
        if active.is_some() {
            info!("Connection already open; ignoring open request");
            return;
        }

        let attempt = Uuid::new_v4();
        self.inner.set_status(ConnectionStatus::Connecting);
        info!("Opening viewer connection (attempt {})", attempt);

        let session = match MediaSession::new(&self.inner.config, attempt).await {
            Ok(session) => Arc::new(session),
            Err(e) => {
                error!("Failed to start media session: {}", e);
                self.inner.set_status(ConnectionStatus::Disconnected);
                return;
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        session.forward_candidates(outbound_tx);
        session.deliver_tracks(Arc::clone(&self.inner.shell));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let relay = tokio::spawn(run_attempt(
            Arc::clone(&self.inner),
            Arc::clone(&session),
            credential,
            attempt,
            outbound_rx,
            shutdown_rx,
        ));

        *active = Some(ConnectionHandle {
            attempt,
            session,
            shutdown: shutdown_tx,
            relay,
        });
    }

    /// Close the active connection, if any.
    ///
    /// Idempotent. The status is `Disconnected` when this returns, whether
    /// or not an attempt was active.
    pub async fn close(&self) {
        let handle = {
            let mut active = self.inner.active.lock().await;
            let handle = active.take();
            self.inner.set_status(ConnectionStatus::Disconnected);
            handle
        };

        let handle = match handle {
            Some(handle) => handle,
            None => {
                debug!("Close requested with no active connection");
                return;
            }
        };

        info!("Closing viewer connection (attempt {})", handle.attempt);
        let _ = handle.shutdown.send(());

        if let Err(e) = handle.session.close().await {
            warn!("Failed to close media session: {}", e);
        }

        match tokio::time::timeout(RELAY_STOP_TIMEOUT, handle.relay).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Relay task ended abnormally: {}", e),
            Err(_) => warn!("Relay task did not stop within {:?}", RELAY_STOP_TIMEOUT),
        }
    }
}

/// Relay task for one attempt. Dials the channel, then shuttles envelopes
/// until closure or shutdown.
async fn run_attempt(
    inner: Arc<Shared>,
    session: Arc<MediaSession>,
    credential: Credential,
    attempt: Uuid,
    mut outbound: mpsc::UnboundedReceiver<IceCandidate>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut channel = tokio::select! {
        connected = SignalingChannel::connect(&inner.config.signaling_url, &credential) => {
            match connected {
                Ok(channel) => channel,
                Err(e) => {
                    warn!("Signaling connect failed for attempt {}: {}", attempt, e);
                    // A refused handshake carries the forbidden status; any
                    // other dial failure has no closure code.
                    let code = e.is_forbidden().then_some(FORBIDDEN_CLOSE_CODE);
                    finish_attempt(
                        &inner,
                        attempt,
                        ConnectionNotice::from_closure(code, e.to_string()),
                    )
                    .await;
                    return;
                }
            }
        }
        _ = shutdown.recv() => {
            debug!("Attempt {} cancelled before the channel opened", attempt);
            return;
        }
    };

    // A close may have raced the dial; only report Connected while this
    // attempt still owns the slot.
    {
        let active = inner.active.lock().await;
        if matches!(active.as_ref(), Some(handle) if handle.attempt == attempt) {
            inner.set_status(ConnectionStatus::Connected);
        }
    }

    loop {
        tokio::select! {
            event = channel.recv() => match event {
                ChannelEvent::Envelope(envelope) => {
                    if let Err(e) = handle_envelope(&session, &mut channel, envelope).await {
                        warn!("Signaling exchange failed for attempt {}: {}", attempt, e);
                    }
                }
                ChannelEvent::Closed { code, reason } => {
                    info!(
                        "Signaling channel closed for attempt {}: code={:?} reason={:?}",
                        attempt, code, reason
                    );
                    finish_attempt(&inner, attempt, ConnectionNotice::from_closure(code, reason))
                        .await;
                    return;
                }
            },
            Some(candidate) = outbound.recv() => {
                if let Err(e) = channel.send(&SignalEnvelope::Candidate(candidate)).await {
                    warn!("Failed to send local candidate for attempt {}: {}", attempt, e);
                }
            }
            _ = shutdown.recv() => {
                channel.close().await;
                debug!("Relay for attempt {} stopped", attempt);
                return;
            }
        }
    }
}

/// Apply one inbound envelope, answering when the remote side offered.
async fn handle_envelope(
    session: &MediaSession,
    channel: &mut SignalingChannel,
    envelope: SignalEnvelope,
) -> Result<()> {
    match envelope {
        SignalEnvelope::Description(description) => {
            let kind = description.kind;
            session.apply_remote(&description).await?;
            if kind == DescriptionKind::Offer {
                let answer = session.answer().await?;
                channel.send(&SignalEnvelope::Description(answer)).await?;
            }
        }
        SignalEnvelope::Candidate(candidate) => {
            session.submit_candidate(&candidate).await?;
        }
    }
    Ok(())
}

/// Tear down from inside the relay after the channel closed or the dial
/// failed. Does nothing when a local close already claimed the attempt.
async fn finish_attempt(inner: &Arc<Shared>, attempt: Uuid, notice: ConnectionNotice) {
    let handle = {
        let mut active = inner.active.lock().await;
        match active.as_ref() {
            Some(handle) if handle.attempt == attempt => {
                let handle = active.take();
                inner.set_status(ConnectionStatus::Disconnected);
                handle
            }
            _ => None,
        }
    };

    let handle = match handle {
        Some(handle) => handle,
        None => {
            debug!("Attempt {} already torn down", attempt);
            return;
        }
    };

    if let Err(e) = handle.session.close().await {
        warn!("Failed to close media session: {}", e);
    }

    inner.shell.notify(notice).await;
}
