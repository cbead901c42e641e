use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use services::object_store::S3ObjectStore;
use services::registry::CsvRegistry;
use services::upload_service::UploadService;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;
    tracing::info!("Starting upload-gateway with config: {:?}", cfg);

    // --- Load the deployment registry ---
    let registry = Arc::new(CsvRegistry::load(&cfg.registry_path)?);
    tracing::info!(
        deployments = registry.len(),
        path = %cfg.registry_path,
        "deployment registry ready"
    );

    // --- Initialize object store client ---
    let store = Arc::new(S3ObjectStore::new(&cfg.s3).await);

    // --- Initialize core service ---
    let service = UploadService::new(
        registry,
        store,
        Duration::from_secs(cfg.presign_expiry_secs),
        cfg.upload_concurrency,
    );

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
