use crate::config::{Config, Mode};
use crate::crypto::Encryptor;
use crate::executor::Registry;
use crate::providers::ProviderFactory;
use crate::tenant::TenantService;
use crate::web::AppState;
use crate::worker::Worker;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod code;
mod config;
mod crypto;
mod db;
mod email;
mod executor;
mod models;
mod oauth;
mod providers;
mod sms;
mod tenant;
#[cfg(test)]
mod test_support;
mod web;
mod worker;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tusker=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let encryptor = match Encryptor::new(&config.root_encryption_key) {
        Ok(encryptor) => Arc::new(encryptor),
        Err(e) => {
            error!(error = %e, "failed to initialize encryptor");
            std::process::exit(1);
        }
    };

    let db = db::setup_db(config.database_url.clone());
    let tenants = Arc::new(TenantService::new(db.clone(), encryptor));
    let providers = Arc::new(ProviderFactory::new(db.clone(), tenants.clone(), &config));
    let registry = Arc::new(Registry::new(db.clone(), providers.clone()));
    let worker = Worker::new(db.clone(), registry, config.worker_concurrency);

    let config = Arc::new(config);
    let state = AppState {
        db,
        tenants,
        providers,
        config: config.clone(),
    };

    // Ctrl-C flips the token; worker loops exit at their next tick and the
    // server finishes in-flight requests.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                cancel.cancel();
            }
        });
    }

    match config.mode {
        Mode::Worker => {
            info!("starting in worker-only mode");
            worker.start(cancel).await;
        }
        Mode::Api => {
            info!("starting in api-only mode");
            serve(state, config.port, cancel).await;
        }
        Mode::Both => {
            let worker_cancel = cancel.clone();
            let worker_handle = tokio::spawn(async move { worker.start(worker_cancel).await });

            serve(state, config.port, cancel).await;

            if let Err(e) = worker_handle.await {
                error!(error = %e, "worker pool task panicked");
            }
        }
    }
}

async fn serve(state: AppState, port: u16, cancel: CancellationToken) {
    let app = web::router(state);

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, port, "failed to bind listener");
            std::process::exit(1);
        }
    };
    info!(port, "listening");

    let shutdown = async move { cancel.cancelled().await };
    if let Err(e) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(error = %e, "server error");
    }
}
