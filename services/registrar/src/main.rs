//! Registrar HTTP service entry point.
//!
//! # Purpose
//! Wires configuration, storage, the enrollment engine, and the session KV,
//! then starts the API server and the metrics endpoint.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup
//! logic.
use anyhow::Context;
use std::future::Future;
use std::sync::Arc;

use registrar::app::{build_router, AppState};
use registrar::auth::{InMemorySessionKv, NullSessionKv, SessionKv};
use registrar::config::{RegistrarConfig, SessionKvBackend, StorageBackend};
use registrar::enrollment::EnrollmentEngine;
use registrar::observability;
use registrar::store::memory::InMemoryStore;
use registrar::store::postgres::PostgresStore;
use registrar::store::RegistrarStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RegistrarConfig::from_env_or_yaml().context("registrar config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: RegistrarConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("campus-registrar");
    let state = build_state(&config).await?;
    tracing::info!(
        backend = state.store.backend_name(),
        durable = state.store.is_durable(),
        "storage backend ready"
    );
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state);
    let addr = config.bind_addr;
    tracing::info!(%addr, "registrar listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {}
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

async fn build_state(config: &RegistrarConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn RegistrarStore> = match config.storage {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::Postgres => {
            let pg = config
                .postgres
                .as_ref()
                .context("postgres configuration missing")?;
            Arc::new(PostgresStore::connect(pg).await?)
        }
    };
    let (sessions, session_kv_backend): (Arc<dyn SessionKv>, &'static str) =
        match config.session_kv {
            SessionKvBackend::None => (Arc::new(NullSessionKv), "null"),
            SessionKvBackend::Memory => (Arc::new(InMemorySessionKv::new()), "memory"),
        };
    let engine = Arc::new(EnrollmentEngine::new(store.clone(), config.lock_timeout));

    Ok(AppState {
        api_version: "v1".to_string(),
        store,
        sessions,
        engine,
        public_key_pem: Arc::from(config.jwt_public_key_pem.as_str()),
        session_kv_backend,
    })
}
