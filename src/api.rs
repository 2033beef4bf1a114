use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::metrics::Metrics;
use crate::render::DashboardBoard;

#[derive(Clone, Default)]
pub struct AppState {
    pub board: DashboardBoard,
    pub metrics: Option<Metrics>,
}

impl AppState {
    pub fn new(board: DashboardBoard) -> Self {
        Self {
            board,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

pub fn router(state: AppState) -> Router {
    let metrics = state.metrics.clone();

    let app = Router::new()
        .route("/health", get(health))
        .route("/user", get(user))
        .route("/dashboard", get(dashboard_text))
        .route("/dashboard.json", get(dashboard_json))
        .layer(CorsLayer::very_permissive())
        .with_state(state);

    match metrics {
        Some(m) => app.merge(m.router()),
        None => app,
    }
}

#[derive(Serialize)]
struct HealthResp {
    status: &'static str,
}

async fn health() -> Json<HealthResp> {
    Json(HealthResp { status: "UP" })
}

#[derive(Serialize)]
struct UserResp {
    id: u32,
    name: &'static str,
    role: &'static str,
}

async fn user() -> Json<UserResp> {
    Json(UserResp {
        id: 1,
        name: "DhruvRE",
        role: "Developer",
    })
}

const NOT_READY: &str = "no snapshot rendered yet";

async fn dashboard_text(State(state): State<AppState>) -> Response {
    match state.board.latest() {
        Some(view) => view.text.into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, NOT_READY).into_response(),
    }
}

async fn dashboard_json(State(state): State<AppState>) -> Response {
    match state.board.latest() {
        Some(view) => Json(view.json).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": NOT_READY })),
        )
            .into_response(),
    }
}
