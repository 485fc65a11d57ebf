//! TallyKV server entry point.
//!
//! Parses configuration, sets up logging, creates the shared store, and
//! accepts connections until Ctrl+C.

use clap::Parser;
use std::sync::Arc;
use tallykv::commands::CommandHandler;
use tallykv::config::Config;
use tallykv::connection::{handle_connection, ConnectionStats};
use tallykv::storage::{ExpirySweeper, StorageEngine};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
  _        _ _       _
 | |_ __ _| | |_   _| | ____   __
 | __/ _` | | | | | | |/ /\ \ / /
 | || (_| | | | |_| |   <  \ V /
  \__\__,_|_|_|\__, |_|\_\  \_/
               |___/

TallyKV v{} - In-Memory Key-Value Store
──────────────────────────────────────────
Server started on {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        tallykv::VERSION,
        config.bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    config.validate()?;

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    print_banner(&config);

    let default_ttl = config.default_ttl();
    let storage = Arc::new(StorageEngine::with_default_ttl(default_ttl));
    match default_ttl {
        Some(ttl) => info!(default_ttl_secs = ttl.as_secs(), "Storage engine initialized"),
        None => info!("Storage engine initialized, no default expiry"),
    }

    let sweeper = config
        .expiry()
        .map(|expiry| ExpirySweeper::start(Arc::clone(&storage), expiry));
    if sweeper.is_none() {
        info!("Background expiry sweeper disabled, relying on lazy expiry");
    }

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&storage), Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    let totals = storage.stats();
    let connections = stats.totals();
    info!(
        keys = totals.keys,
        get_ops = totals.get_ops,
        set_ops = totals.set_ops,
        del_ops = totals.del_ops,
        incr_ops = totals.incr_ops,
        expired = totals.expired,
        connections = connections.accepted,
        commands = connections.commands,
        "Server shutdown complete"
    );
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = CommandHandler::new(Arc::clone(&storage));
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
