//! HTTP API server.
//!
//! `POST /ai` answers a question; `GET /` and `GET /health` are liveness probes.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::AnswerService;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

/// Shared application state.
struct AppState {
    service: AnswerService,
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<&str>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let addr = format!(
        "{}:{}",
        host.unwrap_or(&settings.server.host),
        port.unwrap_or(settings.server.port)
    );

    let orchestrator = Orchestrator::new(settings)?;
    let app = router(orchestrator.answer_service()?);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Hilo API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Greeting", "GET  /");
    Output::kv("Health", "GET  /health");
    Output::kv("Ask", "POST /ai");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(service: AnswerService) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ai", post(ai))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(AppState { service }))
}

// === Request/Response Types ===

#[derive(Debug, Deserialize)]
struct AiRequest {
    message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct AiResponse {
    message: String,
    /// Correlation id, a 32-character hex UUID.
    id: String,
    /// Seconds spent answering; null when the question was rejected.
    process_time: Option<f64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// === Handlers ===

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Hello from the main application!" }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn ai(State(state): State<Arc<AppState>>, Json(req): Json<AiRequest>) -> impl IntoResponse {
    let id = Uuid::new_v4().simple().to_string();

    match state.service.answer(&req.message).await {
        Ok(answer) => Json(AiResponse {
            message: answer.text,
            id,
            process_time: answer.process_time,
        })
        .into_response(),
        Err(e) => {
            error!("Request {} failed: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
