//! Application startup and lifecycle management.

use crate::config::{BackofficeConfig, StorageBackend};
use crate::handlers;
use crate::services::{init_metrics, seed_demo_data, BackOffice};
use crate::store::{MemoryStore, PgStore, Repository};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware};
use service_core::middleware::security_headers::security_headers_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: BackofficeConfig,
    pub backoffice: BackOffice,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: BackofficeConfig) -> Result<Self, AppError> {
        init_metrics();

        let store = open_store(&config).await?;
        if config.seed_demo_data && seed_demo_data(store.as_ref()).await? {
            tracing::info!("Seeded demo agency data into empty store");
        }

        let backoffice = BackOffice::new(store, config.workflow_settings());
        let state = AppState {
            config: config.clone(),
            backoffice,
        };

        let addr = format!("{}:{}", config.common.host, config.common.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Backoffice service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "backoffice-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }
}

async fn open_store(config: &BackofficeConfig) -> Result<Arc<dyn Repository>, AppError> {
    match (config.storage.backend, &config.storage.database) {
        (StorageBackend::Postgres, Some(db)) => {
            let store = PgStore::connect(&db.url, db.max_connections, db.min_connections)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    e
                })?;
            store.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
            Ok(Arc::new(store))
        }
        (StorageBackend::Postgres, None) => Err(AppError::ConfigError(anyhow::anyhow!(
            "postgres storage selected without database settings"
        ))),
        (StorageBackend::Memory, _) => {
            tracing::info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let limiter = create_ip_rate_limiter(
        state.config.rate_limit.attempts,
        state.config.rate_limit.window_seconds,
    );

    let rpc_routes = Router::new()
        .route("/api", post(handlers::rpc))
        .route("/exec", post(handlers::rpc))
        .route_layer(from_fn_with_state(limiter, ip_rate_limit_middleware));

    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .merge(rpc_routes)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins.iter().filter_map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([header::HeaderName::from_static(
            service_core::middleware::tracing::REQUEST_ID_HEADER,
        )])
}
