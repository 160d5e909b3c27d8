//! Farview viewer terminal binary
//!
//! Connects to a farview signaling endpoint as a viewer, answers the
//! streamer's offer, and drains incoming media tracks, reporting
//! connection events on the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Connect with an explicit token
//! cargo run -p farview-viewer-cli -- \
//!   --signaling-url ws://localhost:8000 \
//!   --token <jwt>
//!
//! # Read the token from the environment
//! FARVIEW_TOKEN=<jwt> cargo run -p farview-viewer-cli
//!
//! # Override ICE servers
//! cargo run -p farview-viewer-cli -- \
//!   --stun-servers stun:stun.example.com:3478
//! ```
//!
//! Once running, the terminal accepts `open`, `close`, `status`, and
//! `quit` commands.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use farview_viewer::{
    ConnectionCoordinator, ConnectionNotice, Credential, CredentialSource, EnvCredentialSource,
    PresentationShell, TrackRemote, ViewerConfig,
};

/// Environment variable consulted when no `--token` flag is given
const TOKEN_ENV: &str = "FARVIEW_TOKEN";

/// Farview viewer
///
/// Watches a farview stream from the terminal: dials the signaling
/// endpoint, answers the streamer's offer, and logs incoming media.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket signaling endpoint base URL
    #[arg(
        long,
        default_value = "ws://localhost:8000",
        env = "FARVIEW_SIGNALING_URL"
    )]
    signaling_url: String,

    /// Viewer token (falls back to the FARVIEW_TOKEN environment variable)
    #[arg(long)]
    token: Option<String>,

    /// STUN servers (comma-separated)
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "stun:stun.l.google.com:19302"
    )]
    stun_servers: Vec<String>,
}

/// Credential source that prefers the command line token and falls back
/// to the environment.
struct CliCredentialSource {
    flag: Option<String>,
    env: EnvCredentialSource,
}

impl CredentialSource for CliCredentialSource {
    fn get(&self) -> Option<Credential> {
        match &self.flag {
            Some(token) => Some(Credential::new(token.clone())),
            None => self.env.get(),
        }
    }
}

/// Presentation shell that reports on the terminal.
///
/// Each inbound track gets a reader task that drains RTP and logs a
/// periodic packet count, standing in for a real renderer. Notices are
/// printed directly rather than through the log layer.
#[derive(Default)]
struct TerminalShell {
    tracks_seen: AtomicU64,
}

#[async_trait]
impl PresentationShell for TerminalShell {
    async fn show_track(&self, track: Arc<TrackRemote>) {
        let index = self.tracks_seen.fetch_add(1, Ordering::Relaxed) + 1;
        let kind = track.kind();
        info!(
            %kind,
            ssrc = track.ssrc(),
            codec = %track.codec().capability.mime_type,
            "Track {} attached",
            index
        );

        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            let mut packets = 0u64;
            loop {
                match track.read(&mut buf).await {
                    Ok(_) => {
                        packets += 1;
                        if packets % 500 == 0 {
                            debug!("Track {} ({}): {} packets received", index, kind, packets);
                        }
                    }
                    Err(e) => {
                        debug!("Track {} ({}) reader stopped: {}", index, kind, e);
                        break;
                    }
                }
            }
        });
    }

    async fn notify(&self, notice: ConnectionNotice) {
        println!("{notice}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        signaling_url = %args.signaling_url,
        stun_servers = args.stun_servers.len(),
        "Farview viewer starting"
    );

    let config =
        ViewerConfig::new(&args.signaling_url).with_stun_servers(args.stun_servers.clone());
    let credentials = CliCredentialSource {
        flag: args.token.clone(),
        env: EnvCredentialSource::new(TOKEN_ENV),
    };
    let Some(credential) = credentials.get() else {
        bail!("No viewer token configured; pass --token or set {TOKEN_ENV}");
    };

    let shell = Arc::new(TerminalShell::default());
    let coordinator = ConnectionCoordinator::new(config, shell)
        .context("Failed to create connection coordinator")?;

    // Report status transitions as they happen.
    let mut status_rx = coordinator.watch_status();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = *status_rx.borrow_and_update();
            info!("Connection status: {}", status);
        }
    });

    coordinator.open(credential.clone()).await;
    println!("Commands: open, close, status, quit");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received, closing connection...");
                break;
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    // Stdin closed; treat it like quit.
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to read command input: {}", e);
                        break;
                    }
                };
                match line.trim() {
                    "open" => {
                        let status = coordinator.status();
                        if status.can_open() {
                            coordinator.open(credential.clone()).await;
                        } else {
                            println!("Already {status}; close first.");
                        }
                    }
                    "close" => {
                        let status = coordinator.status();
                        if status.can_close() {
                            coordinator.close().await;
                        } else {
                            println!("Not connected (status: {status}).");
                        }
                    }
                    "status" => println!("{}", coordinator.status()),
                    "quit" | "exit" => break,
                    "" => {}
                    other => {
                        println!("Unknown command: {other} (expected open, close, status, or quit)")
                    }
                }
            }
        }
    }

    coordinator.close().await;
    info!("Farview viewer shut down");
    Ok(())
}

fn init_tracing() {
    // Initialize tracing with EnvFilter for RUST_LOG support
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
