use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::{BoxError, Server};
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Simulation step in milliseconds
    #[clap(short, long, default_value = "50")]
    tick_ms: u64,
    /// Seconds an empty room survives before teardown
    #[clap(short, long, default_value = "60")]
    grace_secs: u64,
    /// Number of levels in a full run
    #[clap(short, long, default_value = "5")]
    max_level: u32,
}

/// Parses arguments, binds the gateway and serves until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        tick_interval: Duration::from_millis(args.tick_ms.max(1)),
        grace_period: Duration::from_secs(args.grace_secs),
        max_level: args.max_level.max(1),
    };
    info!(
        "Starting server: tick {}ms, grace {}s, {} levels",
        config.tick_ms(),
        args.grace_secs,
        config.max_level
    );

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
