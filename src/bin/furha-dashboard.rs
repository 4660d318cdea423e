//! furha dashboard server.
//!
//! - `GET /`: HTML dashboard
//! - `GET /api/mothers`: registry records as JSON
//! - `GET /api/summary`: dashboard summary as JSON
//! - `GET /health`: server status
//!
//! The registry file is re-read on every request so records added by the
//! USSD simulator show up without a restart.
//!
//! Build and run: `cargo run --features server --bin furha-dashboard`

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use furha::config::FurhaConfig;
use furha::dashboard::DashboardSummary;
use furha::record::Mother;
use furha::registry::MotherRegistry;
use furha::risk::{RiskEngine, RiskEngineConfig};

// ── Server state ──────────────────────────────────────────────────────────

type ApiError = (StatusCode, String);

struct ServerState {
    data_file: PathBuf,
    engine: RiskEngine,
}

impl ServerState {
    fn registry(&self) -> Result<MotherRegistry, ApiError> {
        MotherRegistry::open(&self.data_file).map_err(|e| {
            tracing::error!(error = %e, "failed to open registry");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to open registry: {e}"),
            )
        })
    }
}

/// Run registry I/O and model prediction on the blocking pool.
async fn blocking<T, F>(state: Arc<ServerState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&ServerState) -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "dashboard task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("dashboard task failed: {e}"),
            )
        })?
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    model_loaded: bool,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: state.engine.is_loaded(),
    })
}

async fn dashboard(State(state): State<Arc<ServerState>>) -> Result<Html<String>, ApiError> {
    blocking(state, |state| {
        let registry = state.registry()?;
        Ok(Html(DashboardSummary::build(&registry, &state.engine).render_html()))
    })
    .await
}

async fn mothers(State(state): State<Arc<ServerState>>) -> Result<Json<Vec<Mother>>, ApiError> {
    blocking(state, |state| Ok(Json(state.registry()?.mothers().to_vec()))).await
}

async fn summary(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<DashboardSummary>, ApiError> {
    blocking(state, |state| {
        let registry = state.registry()?;
        Ok(Json(DashboardSummary::build(&registry, &state.engine)))
    })
    .await
}

// ── Main ──────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn")),
        )
        .init();

    let config_path =
        std::env::var("FURHA_CONFIG").unwrap_or_else(|_| "furha.toml".to_string());
    let config = FurhaConfig::load_or_default(config_path.as_ref()).unwrap_or_else(|e| {
        tracing::error!("failed to load config {config_path}: {e}");
        std::process::exit(1);
    });

    let bind = std::env::var("FURHA_DASHBOARD_BIND").unwrap_or_else(|_| "127.0.0.1".to_string());
    let addr = format!("{bind}:{}", config.dashboard.port);

    let engine = RiskEngine::new(RiskEngineConfig::from(&config));
    match engine.load_model() {
        Ok(true) => tracing::info!("risk model loaded"),
        Ok(false) => tracing::warn!("no trained risk model; predictions will be \"unknown\""),
        Err(e) => tracing::warn!(error = %e, "failed to load risk model"),
    }

    let state = Arc::new(ServerState {
        data_file: config.paths.data_file.clone(),
        engine,
    });

    let app = Router::new()
        .route("/", get(dashboard))
        .route("/api/mothers", get(mothers))
        .route("/api/summary", get(summary))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state);

    tracing::info!("furha dashboard listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
