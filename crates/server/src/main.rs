//! Hangar server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use hangar_core::config::{AppConfig, MetadataConfig, StorageConfig};
use hangar_metadata::{MetadataStore, SqliteStore};
use hangar_server::directory::EmptyDirectory;
use hangar_server::introspect::EnvelopeIntrospector;
use hangar_server::{AppState, create_router};
use hangar_storage::{FilesystemBackend, ObjectStore, S3Backend};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Hangar - a device deployment orchestration server
#[derive(Parser, Debug)]
#[command(name = "hangard")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "HANGAR_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "hangar_server=info,hangar_metadata=info,tower_http=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config: AppConfig = Figment::new()
        .merge(Toml::file(&args.config))
        .merge(Env::prefixed("HANGAR_").split("__"))
        .extract()
        .with_context(|| format!("failed to load configuration from {}", args.config))?;

    let storage: Arc<dyn ObjectStore> = match &config.storage {
        StorageConfig::Filesystem { path } => Arc::new(
            FilesystemBackend::new(path)
                .await
                .context("failed to initialize filesystem storage")?,
        ),
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            prefix,
            force_path_style,
        } => Arc::new(
            S3Backend::new(
                bucket.clone(),
                endpoint.clone(),
                region.clone(),
                prefix.clone(),
                *force_path_style,
            )
            .await
            .context("failed to initialize S3 storage")?,
        ),
    };

    let metadata: Arc<dyn MetadataStore> = match &config.metadata {
        MetadataConfig::Sqlite { path } => Arc::new(
            SqliteStore::new(path)
                .await
                .context("failed to open metadata store")?,
        ),
    };

    let bind = config.server.bind.clone();
    let state = AppState::new(
        config,
        metadata,
        storage,
        Arc::new(EnvelopeIntrospector),
        Arc::new(EmptyDirectory),
    );
    let router = create_router(state);

    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address '{bind}'"))?;
    tracing::info!(%addr, "hangar server listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
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
    tracing::info!("shutdown signal received");
}
