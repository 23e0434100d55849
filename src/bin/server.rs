//! TreapDB Server Binary
//!
//! Starts the TCP server for TreapDB.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use treapdb::network::Server;
use treapdb::{Config, Database};

/// TreapDB Server
#[derive(Parser, Debug)]
#[command(name = "treapdb-server")]
#[command(about = "Disk-backed ordered key-value store built on a treap")]
#[command(version)]
struct Args {
    /// Index file
    #[arg(short, long, default_value = "./treapdb_data/index.db")]
    index_file: String,

    /// Binary protocol listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:11811")]
    listen: String,

    /// Text protocol listen address (host:port); disabled when omitted
    #[arg(short, long)]
    text_listen: Option<String>,

    /// Node record size in bytes (fixed when the index is created)
    #[arg(short, long, default_value_t = Config::DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Worker threads serving connections
    #[arg(short, long, default_value = "16")]
    workers: usize,

    /// Maximum connections waiting for a worker
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,treapdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("TreapDB Server v{}", treapdb::VERSION);
    tracing::info!("Index file: {}", args.index_file);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let mut builder = Config::builder()
        .index_path(&args.index_file)
        .listen_addr(&args.listen)
        .block_size(args.block_size)
        .worker_threads(args.workers)
        .max_connections(args.max_connections);
    if let Some(text) = &args.text_listen {
        builder = builder.text_listen_addr(text);
    }
    let config = builder.build();

    // Open engine
    let engine = match Database::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    match engine.length() {
        Ok(n) => tracing::info!("Engine initialized with {} entries", n),
        Err(e) => {
            tracing::error!("Index is unreadable: {}", e);
            std::process::exit(1);
        }
    }

    let server = match Server::bind(config, Arc::clone(&engine)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = engine.close() {
        tracing::error!("Failed to close engine: {}", e);
    }
}
