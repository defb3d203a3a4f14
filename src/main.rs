//! LogCaster server binary
//!
//! Concurrent TCP log ingestion server with in-memory querying, optional disk
//! persistence, and optional IRC log streaming.

use clap::Parser;
use logcaster::config::ServerConfig;
use logcaster::server::LogCaster;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "logcaster")]
#[command(about = "Concurrent log ingestion server with querying and IRC streaming")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "config/logcaster.toml")]
    config: PathBuf,

    /// Ingest port
    #[arg(short = 'p')]
    port: Option<u16>,

    /// Enable disk persistence
    #[arg(short = 'P')]
    persist: bool,

    /// Persistence directory
    #[arg(short = 'd')]
    directory: Option<PathBuf>,

    /// Rotation size in megabytes
    #[arg(short = 's')]
    size_mb: Option<u64>,

    /// Enable the IRC listener on its default port
    #[arg(short = 'i')]
    irc: bool,

    /// Enable the IRC listener on the given port
    #[arg(short = 'I')]
    irc_port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(if args.verbose {
            "logcaster=debug,info"
        } else {
            "logcaster=info,warn,error"
        })
        .with_target(false)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Starting LogCaster v{}", env!("CARGO_PKG_VERSION"));

    let mut config = if args.config.exists() {
        match ServerConfig::from_file(&args.config) {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    } else {
        ServerConfig::default()
    };

    // CLI flags override file values
    if let Some(port) = args.port {
        config.server.ingest_port = port;
    }
    if args.persist {
        config.persistence.enabled = true;
    }
    if let Some(directory) = args.directory {
        config.persistence.log_directory = directory;
    }
    if let Some(size_mb) = args.size_mb {
        config.persistence.max_file_size = size_mb * 1024 * 1024;
    }
    if args.irc || args.irc_port.is_some() {
        config.irc.enabled = true;
    }
    if let Some(irc_port) = args.irc_port {
        config.irc.port = irc_port;
    }

    info!("Ingest port: {}", config.server.ingest_port);
    info!("Query port: {}", config.server.query_port);
    if config.persistence.enabled {
        info!(
            "Persistence enabled, directory: {}, max size: {} MB",
            config.persistence.log_directory.display(),
            config.persistence.max_file_size / (1024 * 1024)
        );
    }
    if config.irc.enabled {
        info!("IRC enabled on port {}", config.irc.port);
    }

    let server = match LogCaster::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Fatal error: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown_signal = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = server.start() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        _ = shutdown_signal => {}
    }

    server.shutdown().await;
    info!("LogCaster stopped");
}
