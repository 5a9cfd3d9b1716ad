//! Glass Server - Secret Store HTTP API
//!
//! Wires the trust and data core behind a thin axum façade: bearer
//! authentication middleware, the secured secret service on the `/v1`
//! routes, hot-reloaded policy, and optional envelope encryption at rest.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{
    routing::get,
    Router,
};
use glass_auth::{Authenticator, BearerAuthenticator, NoopAuthenticator};
use glass_crypto::{Envelope, Keyring};
use glass_policy::{ManagerOptions, PolicyManager, PolicySource, RuntimeAuthorizer};
use glass_store::{
    migrate, open, MemorySecretStore, SecretService, SecuredSecretStore, SqliteSecretStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

pub use config::{AuthMode, EncryptionMode, ServerConfig, StorageBackend};
pub use error::{ServerError, ServerResult};
pub use state::AppState;

/// Bound on draining in-flight requests at shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-request timeout applied to the whole router
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router over assembled state.
///
/// The `/v1` routes sit behind the authentication middleware; the probe
/// routes do not.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/v1/secret",
            get(routes::secrets::get_secret).put(routes::secrets::put_secret),
        )
        .route("/v1/secret/meta", get(routes::secrets::get_secret_meta))
        .route("/v1/secrets", get(routes::secrets::list_secrets))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(routes::health::routes())
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

/// Assemble all resources from configuration and run the server until a
/// shutdown signal arrives.
pub async fn serve(config: ServerConfig) -> ServerResult<()> {
    info!("starting glass server v{}", env!("CARGO_PKG_VERSION"));

    // Envelope engine, when encryption is configured
    let envelope = match config.encryption_mode {
        EncryptionMode::None => None,
        EncryptionMode::Envelope => {
            let kek_dir = config.kek_dir.as_ref().ok_or_else(|| {
                ServerError::Configuration("KEK_DIR is required".to_string())
            })?;
            let keyring = Keyring::load(kek_dir, &config.active_kek_id)?;
            Some(Arc::new(Envelope::new(Arc::new(keyring))))
        }
    };

    // Storage backend
    let inner: Arc<dyn SecretService> = match config.storage_backend {
        StorageBackend::Sqlite => {
            let pool = open(&config.sqlite_path).await.map_err(store_config_err)?;
            migrate(&pool).await.map_err(store_config_err)?;
            match &envelope {
                Some(envelope) => {
                    Arc::new(SqliteSecretStore::with_envelope(pool, Arc::clone(envelope)))
                }
                None => Arc::new(SqliteSecretStore::new(pool)),
            }
        }
        StorageBackend::Memory => Arc::new(MemorySecretStore::new()),
    };

    // Policy: initial load must succeed before the server accepts traffic
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let manager = Arc::new(PolicyManager::new(
        &config.policy_file,
        ManagerOptions::default(),
    ));
    Arc::clone(&manager).start(shutdown_rx.clone())?;
    let authorizer = Arc::new(RuntimeAuthorizer::new(manager as Arc<dyn PolicySource>));

    let secrets = Arc::new(SecuredSecretStore::new(inner, authorizer));

    // Authentication
    let authenticator: Arc<dyn Authenticator> = match config.auth_mode {
        AuthMode::Bearer => {
            let token_file = config.auth_token_file.as_ref().ok_or_else(|| {
                ServerError::Configuration("AUTH_TOKEN_FILE is required".to_string())
            })?;
            Arc::new(BearerAuthenticator::from_file(token_file)?)
        }
        AuthMode::Noop => {
            warn!("authentication disabled (AUTH_MODE=noop)");
            Arc::new(NoopAuthenticator)
        }
    };

    let app = build_router(AppState::new(secrets, authenticator));

    let addr = format!("{}:{}", config.http_addr, config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "listening");

    // Signal handling drives both the policy reloader and the listener
    let mut drain_rx = shutdown_rx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let mut serve_rx = shutdown_rx;
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = serve_rx.changed().await;
            })
            .await
    });

    tokio::select! {
        // The listener stopped on its own (bind/accept failure)
        result = &mut server => {
            flatten_serve(result)?;
        }
        _ = drain_rx.changed() => {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut server).await {
                Ok(result) => flatten_serve(result)?,
                Err(_) => {
                    warn!("drain timeout exceeded, aborting in-flight requests");
                    server.abort();
                }
            }
        }
    }

    info!("server stopped");
    Ok(())
}

fn flatten_serve(
    result: Result<Result<(), std::io::Error>, tokio::task::JoinError>,
) -> ServerResult<()> {
    match result {
        Ok(inner) => inner.map_err(ServerError::Io),
        Err(join_err) => Err(ServerError::Internal(join_err.to_string())),
    }
}

fn store_config_err(err: glass_store::StoreError) -> ServerError {
    ServerError::Configuration(err.to_string())
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
