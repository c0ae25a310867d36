//! camfeed server binary
//!
//! Run with: camfeed [--address 0.0.0.0] [--port 8080] [--server-threads 1] [--bus-threads 2]
//!
//! Then browse to http://localhost:8080/ for the camera list. Log verbosity is
//! controlled with `RUST_LOG` (default `info`).

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use camfeed::{CodecRegistry, LocalBus, ServerConfig, VideoServer};

#[derive(Parser, Debug)]
#[command(name = "camfeed", version, about = "Stream camera topics over HTTP")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    address: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = camfeed::server::config::DEFAULT_PORT)]
    port: u16,

    /// Worker threads servicing HTTP requests
    #[arg(long, default_value_t = 1)]
    server_threads: usize,

    /// Worker threads delivering bus callbacks
    #[arg(long, default_value_t = 2)]
    bus_threads: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::with_addr(SocketAddr::new(args.address, args.port))
        .server_threads(args.server_threads)
        .bus_threads(args.bus_threads);
    config.validate()?;

    let bus = Arc::new(LocalBus::new(config.bus_threads)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server_threads)
        .thread_name("http-worker")
        .enable_all()
        .build()?;

    tracing::info!(
        addr = %config.bind_addr,
        server_threads = config.server_threads,
        bus_threads = config.bus_threads,
        "Starting camfeed"
    );

    runtime.block_on(async move {
        let server = VideoServer::new(config, bus, CodecRegistry::with_defaults())?;
        server
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                }
            })
            .await
    })?;

    Ok(())
}
