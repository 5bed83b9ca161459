//! InviteGate console host.
//!
//! Reads one protocol event per line from stdin and feeds it to an
//! [`AdmissionGate`] backed by the data directory (`$INVITEGATE_HOME` or
//! `~/.invitegate`). Watchdogs run on the tokio runtime, so expiry happens
//! in real time while the host waits for input.
//!
//! ```text
//! stdin -> Event::parse -> ConsoleHost -> AdmissionGate -> stdout
//!                                               |
//!                                     TokioScheduler (watchdogs)
//! ```
//!
//! The state file is saved on `quit`, end of input, or Ctrl-C.

mod host;
mod protocol;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use invitegate_config::data_dir;
use invitegate_core::{AdmissionGate, TokioScheduler};

use crate::host::{ConsoleHost, Flow, MemoryExclusions, StdoutConsole};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // stdout belongs to the protocol.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let dir = data_dir().context("no data directory: set INVITEGATE_HOME")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let exclusions = Arc::new(MemoryExclusions::default());
    let scheduler = Arc::new(TokioScheduler::new(Handle::current()));
    let gate = AdmissionGate::open(&dir, exclusions.clone(), scheduler)
        .context("failed to start the admission gate")?;
    tracing::info!(dir = %dir.display(), "InviteGate ready; type help for events");

    let mut host = ConsoleHost::new(Arc::clone(&gate), exclusions, Arc::new(StdoutConsole));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if host.handle_line(&line) == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read input: {e}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    tracing::info!(online = host.online(), "Shutting down");
    if let Err(e) = gate.save() {
        eprintln!("Failed to save verification state: {e}");
    }

    Ok(())
}
