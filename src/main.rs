// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

use chrono::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use router_control::{
    api::router,
    billing::{HttpLedger, InMemoryLedger, LedgerBackend, LedgerError},
    capability::{load_or_create_secret, CapabilityService},
    config::{ConfigError, Settings, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    providers::{BuiltinProvider, HttpProvider, Provider, ProviderError},
    state::AppState,
    storage::{FileStore, RouterRepository, StorageError},
};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Router control server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let settings = Settings::from_env()?;

    let mut storage = FileStore::new(settings.storage_paths());
    storage.initialize()?;
    tracing::info!(
        data_dir = %storage.paths().root().display(),
        datasites = %storage.paths().datasites_root().display(),
        "Storage initialized"
    );

    let secret = load_or_create_secret(&storage, settings.control_token_secret.as_deref())?;
    let capabilities =
        CapabilityService::new(&secret, Duration::days(settings.control_token_ttl_days));

    let ledger = match &settings.ledger_url {
        Some(url) => LedgerBackend::Http(HttpLedger::new(url, settings.ledger_api_key.clone())?),
        None => {
            tracing::warn!("LEDGER_URL not set; using the in-process ledger (development mode)");
            LedgerBackend::Memory(InMemoryLedger::default())
        }
    };

    let provider = match &settings.provider_url {
        Some(url) => Provider::Http(HttpProvider::new(url)?),
        None => Provider::Builtin(BuiltinProvider::new(storage.paths().projects_dir())),
    };

    if settings.auth_jwt_secret.is_none() {
        tracing::warn!("AUTH_JWT_SECRET not set; session tokens are not signature-checked (development mode)");
    }

    report_unreconciled(&storage, &settings.owner_email);

    let bind_address = settings.bind_address();
    let owner = settings.owner_email.clone();
    let state = AppState::new(settings, storage, capabilities, ledger, provider);
    tracing::info!(
        ledger = state.ledger.kind(),
        provider = state.provider.kind(),
        owner = %owner,
        "Control plane ready"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "Router control server listening (docs at /docs)");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("Router control server stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    // Fails only when a subscriber is already installed.
    let _ = if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
}

/// Log routers whose snapshot write failed on a previous run.
fn report_unreconciled(storage: &FileStore, owner: &str) {
    match RouterRepository::new(storage).list_by_owner(owner) {
        Ok(routers) => {
            for router in routers.iter().filter(|r| r.needs_reconciliation) {
                tracing::warn!(
                    router = %router.name,
                    "Router snapshot diverged from its record; POST /v1/routers/{{name}}/reconcile to repair"
                );
            }
        }
        Err(e) => tracing::warn!(error = %e, "Could not scan routers for reconciliation"),
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
