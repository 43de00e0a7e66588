//! Recall daemon: serves a single [`MemoryManager`] over JSON-lines TCP.

mod server;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use recall_core::telemetry::level_for;
use recall_core::{MemoryManager, RecallConfig, METRICS};

#[derive(Parser)]
#[command(name = "recalld")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Recall memory service", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "RECALL_LISTEN", default_value = "127.0.0.1:7411")]
    listen: SocketAddr,

    /// State directory (default: .recall)
    #[arg(long, env = "RECALL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Keep state in memory only
    #[arg(long, conflicts_with = "data_dir")]
    in_memory: bool,

    /// Maximum memories retained on every write
    #[arg(long)]
    max_memories: Option<usize>,

    /// Close connections idle for this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Args {
    fn config(&self) -> Result<RecallConfig> {
        let mut config = RecallConfig::from_env().context("Invalid RECALL_* environment")?;
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir);
        }
        if let Some(max) = self.max_memories {
            config = config.with_max_memories(max);
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout_secs = secs;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    recall_core::init_tracing(args.json, level_for(args.verbose));

    let config = args.config()?;
    let idle = Duration::from_secs(config.request_timeout_secs);
    let manager = if args.in_memory {
        MemoryManager::in_memory(config)
    } else {
        let dir = config.data_dir.clone();
        MemoryManager::open_dir(config)
            .with_context(|| format!("Failed to open state in {}", dir.display()))?
    };

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    info!(
        event = "server.listening",
        addr = %listener.local_addr()?,
        version = recall_core::VERSION,
    );

    server::serve(listener, Arc::new(manager), idle, shutdown_signal()).await?;

    METRICS.flush();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(event = "server.signal_unavailable", error = %e);
        std::future::pending::<()>().await;
    }
}
