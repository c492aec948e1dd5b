//! rootbox server binary.
//!
//! Serves listing, upload and deletion of files confined to a single root
//! directory. The root is opened once at startup and shared with every
//! handler; the process refuses to start when it does not exist.

mod atomic;
mod config;
mod error;
mod files;
mod http;
mod logging;
mod router;
mod storage;
mod upload;
mod version;

use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

use crate::config::{Args, SHUTDOWN_GRACE_SECS};
use crate::router::{RouterSettings, build_router};
use crate::storage::Storage;

shadow!(build);

/// Starts the server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let storage = match Storage::open(&args.root_dir) {
        Ok(storage) => Arc::new(storage),
        Err(err) => {
            error!(root = %args.root_dir.display(), error = %err, "cannot open root directory");
            return Err(err.into());
        }
    };
    info!(root = %storage.root_path().display(), "storage root ready");

    let settings = RouterSettings {
        upload_max_size: args.upload_max_size,
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        cors_origins: args.cors_origins.clone(),
    };
    let app = build_router(storage, &settings);

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let addr = SocketAddr::new(host, args.port);
    let handle = Handle::new();

    info!("Starting HTTP server at {}", addr);
    let server = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());

    tokio::spawn(shutdown_signal(handle));
    server.await
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(SHUTDOWN_GRACE_SECS)));
}
