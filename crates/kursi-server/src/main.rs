//! Kursi server binary.
//!
//! # Usage
//!
//! ```bash
//! # Five rooms of 35 seats on port 8080
//! kursi-server
//!
//! # Custom rooms and seat count
//! kursi-server --bind 127.0.0.1:9000 --rooms lobby,stage --seats 20
//! ```

use std::time::Duration;

use clap::Parser;
use kursi_server::{DriverConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Kursi seat and presence server
#[derive(Parser, Debug)]
#[command(name = "kursi-server")]
#[command(about = "Room seat and presence server over WebSocket")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Comma-separated room identifiers
    #[arg(long, value_delimiter = ',', default_value = "room1,room2,room3,room4,room5")]
    rooms: Vec<String>,

    /// Seats in every room
    #[arg(long, default_value = "35")]
    seats: u32,

    /// Seconds a claimed seat waits for confirmation
    #[arg(long, default_value = "10")]
    lock_expiry_secs: u64,

    /// Milliseconds between buffer flushes
    #[arg(long, default_value = "100")]
    tick_ms: u64,

    /// Seconds between rotating counter broadcasts
    #[arg(long, default_value = "900")]
    counter_interval_secs: u64,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Kursi server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        tick_interval: Duration::from_millis(args.tick_ms),
        counter_interval: Duration::from_secs(args.counter_interval_secs),
        driver: DriverConfig {
            rooms: args.rooms,
            seats_per_room: args.seats,
            lock_expiry: Duration::from_secs(args.lock_expiry_secs),
            max_connections: args.max_connections,
            ..Default::default()
        },
        ..Default::default()
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
