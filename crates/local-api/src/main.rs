use anyhow::Result;

#[cfg(test)]
mod tests;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chatgate_common::{
    ChatRequest, ChatResponse, ErrorResponse, HealthResponse, HealthStatus, MetricsSnapshot,
    PipelineMetrics, RequestId,
};
use chatgate_config::{AppConfig, ConfigLoader};
use chatgate_orchestrator::{ChatOptions, ChatOrchestrator};
use chatgate_runtime::ModelRuntime;
use chatgate_safety::{ScanClient, SafetyProfile};
use std::{path::PathBuf, sync::Arc, time::SystemTime};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<ChatOrchestrator>,
    /// Used when a request does not name its conversation
    default_conversation_id: Arc<str>,
    start_time: SystemTime,
    metrics: PipelineMetrics,
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = RequestId::new();
    let prompt = request.validate().map_err(|e| {
        warn!(request_id = %request_id, "Rejected chat request: {}", e);
        (StatusCode::BAD_REQUEST, Json(ErrorResponse::from(&e)))
    })?;

    let conversation_id = request
        .conversation_id
        .as_deref()
        .unwrap_or(&*state.default_conversation_id);

    info!(request_id = %request_id, conversation_id, "Chat request");
    let response = state.orchestrator.chat(conversation_id, prompt).await;

    Ok(Json(ChatResponse {
        response,
        conversation_id: conversation_id.to_string(),
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().unwrap_or_default().as_secs();

    let safety_enabled = state.orchestrator.scanning_enabled();
    // Unscanned traffic reports as degraded
    let status = if safety_enabled {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    Json(HealthResponse {
        status,
        safety_enabled,
        model: state.orchestrator.model_name().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
    })
}

async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot().await)
}

fn router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let app = Router::new()
        .route("/api/chat", post(chat))
        .route("/healthz", get(health_check))
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics));

    let app = match static_dir {
        Some(dir) => {
            info!("Serving static files from {}", dir.display());
            app.fallback_service(ServeDir::new(dir))
        }
        None => app,
    };

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

fn build_state(config: &AppConfig) -> Result<AppState> {
    let backend = ModelRuntime::create(config)?;
    let store = chatgate_store::open(&config.store);
    let scanner = Arc::new(ScanClient::new(SafetyProfile::from_config(
        &config.safety,
        backend.model_name(),
    )));

    // Context is read once; every turn reuses it
    let options = ChatOptions {
        system_prompt: config.chat.load_instructions()?,
        ..ChatOptions::from(config)
    };

    let metrics = PipelineMetrics::new();
    let orchestrator =
        ChatOrchestrator::new(backend, store, scanner, options).with_metrics(metrics.clone());

    Ok(AppState {
        orchestrator: Arc::new(orchestrator),
        default_conversation_id: uuid::Uuid::new_v4().to_string().into(),
        start_time: SystemTime::now(),
        metrics,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Starting ChatGate server");

    // Optional config path as the first argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ConfigLoader::load(config_path.as_ref())?;

    let state = build_state(&config)?;
    info!("Default conversation id: {}", state.default_conversation_id);

    let app = router(state, config.server.static_dir.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
