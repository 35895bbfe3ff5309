use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use identity_backend_lib::{
    config::Settings,
    media::LocalBlobStore,
    router,
    storage::{FlatFileIdentityStore, TimeoutStore},
    AppState,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Identity and session service
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to a TOML config file (defaults to ./config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding server.host/server.port
    #[arg(long)]
    bind: Option<SocketAddr>,
}

fn init_tracing(settings: &Settings) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);
    if settings.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("failed to load configuration")?;

    init_tracing(&settings);

    let addr = match args.bind {
        Some(addr) => addr,
        None => settings.bind_addr()?,
    };

    let store = FlatFileIdentityStore::new(&settings.storage.path)
        .context("failed to open identity store")?;
    let store = TimeoutStore::new(store, settings.storage.timeout());
    let blobs = LocalBlobStore::new(&settings.media.path, settings.media.base_url.clone())
        .context("failed to open media directory")?;

    let state = Arc::new(AppState::new(store, Arc::new(blobs), settings)?);
    let app = router::create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
