//! memkeep daemon
//!
//! The `memkeepd` binary hosts a memory manager behind the memkeep wire
//! protocol:
//! - Reserves the arena and starts the background collector
//! - Optionally compacts the arena on a fixed period
//! - Serves clients over TCP until SIGTERM/SIGINT
//!
//! # Usage
//!
//! ```bash
//! # 1 MB arena on the default port
//! memkeepd
//!
//! # 64 MB arena, snapshots in ./dumps
//! memkeepd --port 9000 --memsize 64 --dump-folder ./dumps
//!
//! # Use configuration file
//! memkeepd --config /etc/memkeep/memkeepd.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use memkeep_core::MemoryManager;
use memkeep_server::{MemoryServer, MemoryService, ServerConfig};

/// memkeep daemon
#[derive(Parser, Debug)]
#[command(
    name = "memkeepd",
    version,
    about = "memkeep memory manager server",
    long_about = "Hosts a fixed-capacity, reference-counted, compacting memory arena.\n\n\
                  Clients create, read and write blocks over TCP."
)]
struct Args {
    /// Host address to bind to
    #[arg(short = 'H', long, env = "MEMKEEP_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short = 'p', long, env = "MEMKEEP_PORT")]
    port: Option<u16>,

    /// Arena size in MB
    #[arg(short = 'm', long, value_name = "MB", env = "MEMKEEP_MEMSIZE")]
    memsize: Option<usize>,

    /// Directory that receives arena snapshots
    #[arg(short = 'd', long, value_name = "DIR", env = "MEMKEEP_DUMP_FOLDER")]
    dump_folder: Option<PathBuf>,

    /// Write a snapshot after every mutating operation
    #[arg(long)]
    dump_on_mutation: bool,

    /// Collector wake interval in milliseconds
    #[arg(long, value_name = "MS", env = "MEMKEEP_GC_INTERVAL_MS")]
    gc_interval_ms: Option<u64>,

    /// Compact the arena every N seconds (0 disables)
    #[arg(long, value_name = "SECS", env = "MEMKEEP_DEFRAG_INTERVAL_SECS")]
    defrag_interval_secs: Option<u64>,

    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "MEMKEEP_LOG_LEVEL")]
    log_level: String,

    /// Print configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = load_config(&args)?;

    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    run_server(config).await
}

fn init_logging(args: &Args) {
    let level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let filter = EnvFilter::try_new(format!(
        "memkeepd={level},memkeep_server={level},memkeep_core={level}"
    ))
    .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = if let Some(path) = &args.config {
        ServerConfig::from_file(path).context("Failed to load config file")?
    } else {
        ServerConfig::default()
    };

    // Command-line arguments override the file
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(megabytes) = args.memsize {
        config.manager.capacity = megabytes.saturating_mul(memkeep_common::BYTES_PER_MB);
    }
    if let Some(dir) = &args.dump_folder {
        config.manager.dump_dir = Some(dir.clone());
    }
    if args.dump_on_mutation {
        config.manager.dump_on_mutation = true;
    }
    if let Some(ms) = args.gc_interval_ms {
        config.manager.collector_interval_ms = ms;
    }
    if let Some(secs) = args.defrag_interval_secs {
        config.defrag_interval_secs = Some(secs);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run_server(config: ServerConfig) -> Result<()> {
    let manager = Arc::new(
        MemoryManager::new(config.manager.clone()).context("Failed to create memory manager")?,
    );

    info!("Server configuration:");
    info!("  Listen address: {}", config.socket_addr());
    info!("  Arena capacity: {} bytes", config.manager.capacity);
    info!(
        "  Collector interval: {} ms",
        config.manager.collector_interval_ms
    );
    if let Some(dir) = &config.manager.dump_dir {
        info!("  Snapshot folder: {}", dir.display());
    }

    let defrag_task = config
        .defrag_interval()
        .map(|period| tokio::spawn(defragment_periodically(Arc::clone(&manager), period)));

    let server = MemoryServer::bind(config.socket_addr(), MemoryService::new(Arc::clone(&manager)))
        .await
        .context("Failed to bind listener")?;
    info!("Press Ctrl+C to shutdown");

    if let Err(e) = server.serve_until(shutdown_signal()).await {
        error!("Server error: {}", e);
        return Err(anyhow::anyhow!("Server error: {}", e));
    }

    info!("Shutting down gracefully...");
    if let Some(task) = defrag_task {
        task.abort();
    }
    manager.shutdown();
    if let Some(dir) = &config.manager.dump_dir {
        match manager.dump("shutdown") {
            Ok(path) => info!("Final snapshot written to {}", path.display()),
            Err(e) => error!("Failed to write final snapshot in {}: {}", dir.display(), e),
        }
    }

    info!("Server stopped.");
    Ok(())
}

async fn defragment_periodically(manager: Arc<MemoryManager>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let result = manager.defragment();
        debug!(
            moved = result.blocks_moved,
            recovered = result.bytes_recovered(),
            "periodic defragment"
        );
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}
