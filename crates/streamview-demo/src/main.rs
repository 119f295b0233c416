//! Streamview demo server.
//!
//! Mounts three views and serves them until `Ctrl-C`:
//!
//! - `/` a transient counter whose state is the browser's signals
//! - `/counter` a persistent counter held by a session actor
//! - `/clock` a persistent clock updated once a second by broadcast
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `STREAMVIEW_CONFIG` or `streamview.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the live router
//! 4. Spawn the clock broadcaster
//! 5. Serve; `Ctrl-C` stops every session so open streams close

mod views;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use streamview_core::SessionDirectory;
use streamview_server::{
    init_logging, start_server, LiveRouter, LiveState, StreamviewConfig,
};
use tracing::{debug, info};

use crate::views::{Clock, Counter, QuickCounter};

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG: &str = "streamview.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, source) = load_config()?;
    init_logging(&config.logging)?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        keepalive_secs = config.live.keepalive_secs,
        reconnect_grace_ms = config.live.reconnect_grace_ms,
        attach_timeout_ms = config.live.attach_timeout_ms,
        source = %source,
        "streamview-demo starting"
    );

    let state = LiveState::new(config.live.clone(), config.server.title.clone());
    let live = LiveRouter::new(state)
        .live("/", QuickCounter)
        .live("/counter", Counter)
        .live("/clock", Clock);

    let directory = live.directory();
    let clock = tokio::spawn(run_clock(Arc::clone(&directory)));
    let result = start_server(&config.server, live.build(), directory).await;
    clock.abort();

    result.context("server failed")?;
    Ok(())
}

/// Load configuration, falling back to defaults when no file exists.
fn load_config() -> anyhow::Result<(StreamviewConfig, String)> {
    let path = std::env::var("STREAMVIEW_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG), PathBuf::from);
    if path.exists() {
        let config = StreamviewConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?;
        Ok((config, path.display().to_string()))
    } else {
        Ok((defaults()?, String::from("defaults")))
    }
}

fn defaults() -> anyhow::Result<StreamviewConfig> {
    // Parsing an empty document still applies the env overrides.
    StreamviewConfig::parse("").context("applying environment overrides")
}

/// Broadcast the wall clock to every session once a second.
async fn run_clock(directory: Arc<SessionDirectory>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        interval.tick().await;
        let now = chrono::Local::now().format("%H:%M:%S").to_string();
        let delivered = directory.broadcast(&json!({ "clock": now }));
        if delivered > 0 {
            debug!(sessions = delivered, "clock broadcast");
        }
    }
}
