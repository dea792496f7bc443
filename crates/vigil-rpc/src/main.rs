//! Vigil RPC Server - management agent for the platform registry.
//!
//! This binary hosts the process-wide registry with its platform objects and
//! exposes discovery and attribute/operation access as JSON-RPC 2.0 over
//! HTTP. With `--ipc` it also serves the same registry over the local TCP
//! IPC transport.

mod handler;
mod server;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use vigil_core::{platform_dispatcher, IpcServer};

#[derive(Parser, Debug)]
#[command(name = "vigil-rpc")]
#[command(about = "JSON-RPC management agent for the Vigil platform registry")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Also serve the registry over the local IPC transport
    #[arg(long)]
    ipc: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Vigil RPC Server");

    let dispatcher = platform_dispatcher()?;
    info!("Platform registry holds {} objects", dispatcher.object_count()?);

    let ipc_handle = if args.ipc {
        Some(IpcServer::start(Arc::new(dispatcher.clone())).await?)
    } else {
        None
    };
    let ipc_port = ipc_handle.as_ref().map(|handle| handle.port);

    let addr = server::start_server(dispatcher, ipc_port, &args.host, args.port).await?;

    // Ports are read from stdout by the launching process.
    println!("RPC_PORT={}", addr.port());
    if let Some(port) = ipc_port {
        println!("IPC_PORT={}", port);
    }

    info!("RPC server running on {}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    drop(ipc_handle);
    Ok(())
}
