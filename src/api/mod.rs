use axum::{
    routing::{get, post},
    Router,
    Json,
    extract::{DefaultBodyLimit, State},
    response::{IntoResponse, Response},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{CorsLayer, Any};
use uuid::Uuid;
use validator::Validate;

use crate::food::analysis::Analysis;
use crate::food::chart::{ChartSeries, NO_DATA_MESSAGE};
use crate::food::session::{AnalyzeOutcome, MealAnalyzer, SessionSnapshot, SessionState, SkipReason};
use crate::providers::utils::ImagePayload;

const MAX_CONCURRENT_REQUESTS: usize = 32;
// Data URLs for phone photos run well past axum's 2 MB default.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    analyzer: MealAnalyzer,
}

#[derive(Deserialize, Validate)]
pub struct ImageRequest {
    #[validate(length(min = 1))]
    image: String,
}

#[derive(Serialize)]
pub struct ImageResponse {
    image_id: Uuid,
    state: SessionState,
}

#[derive(Serialize)]
pub struct SessionResponse {
    state: SessionState,
    image_id: Option<Uuid>,
    analysis: Option<Analysis>,
    chart: Option<ChartSeries>,
    message: Option<&'static str>,
    error: Option<String>,
}

impl From<SessionSnapshot> for SessionResponse {
    fn from(snapshot: SessionSnapshot) -> Self {
        let chart = snapshot.chart();
        let message = match (&snapshot.analysis, &chart) {
            (Some(_), None) => Some(NO_DATA_MESSAGE),
            _ => None,
        };
        Self {
            state: snapshot.state,
            image_id: snapshot.image_id,
            analysis: snapshot.analysis,
            chart,
            message,
            error: snapshot.error,
        }
    }
}

#[derive(Serialize)]
struct ApiResponse {
    status: String,
}

fn error_response(code: StatusCode, status: impl Into<String>) -> Response {
    (code, Json(ApiResponse { status: status.into() })).into_response()
}

/// Create and configure the API router
pub fn create_api(analyzer: MealAnalyzer) -> Router {
    let state = AppState { analyzer };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_check))
        .route("/image", post(image_handler))
        .route("/analyze", post(analyze_handler))
        .route("/session", get(session_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(ApiResponse { status: "ok".to_string() })
}

async fn image_handler(
    State(state): State<AppState>,
    Json(request): Json<ImageRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return error_response(StatusCode::BAD_REQUEST, format!("Invalid request: {}", e));
    }

    let payload = match ImagePayload::from_data_url(&request.image) {
        Ok(payload) => payload,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let image_id = state.analyzer.select_image(payload);
    Json(ImageResponse {
        image_id,
        state: state.analyzer.state(),
    })
    .into_response()
}

async fn analyze_handler(State(state): State<AppState>) -> Response {
    match state.analyzer.analyze().await {
        AnalyzeOutcome::Skipped(SkipReason::NoImage) => {
            error_response(StatusCode::CONFLICT, "No image selected")
        }
        AnalyzeOutcome::Skipped(SkipReason::AlreadyAnalyzing) => {
            (StatusCode::ACCEPTED, Json(SessionResponse::from(state.analyzer.snapshot()))).into_response()
        }
        AnalyzeOutcome::Failed(_) => {
            (StatusCode::BAD_GATEWAY, Json(SessionResponse::from(state.analyzer.snapshot()))).into_response()
        }
        AnalyzeOutcome::Completed(_) | AnalyzeOutcome::Discarded => {
            Json(SessionResponse::from(state.analyzer.snapshot())).into_response()
        }
    }
}

async fn session_handler(State(state): State<AppState>) -> Response {
    Json(SessionResponse::from(state.analyzer.snapshot())).into_response()
}
