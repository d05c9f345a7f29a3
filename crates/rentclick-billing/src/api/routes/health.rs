use crate::{api::types::HealthResponse, server::AppState};
use axum::{extract::State, Json};

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: state.config.service.name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: state.clock.now(),
    })
}
