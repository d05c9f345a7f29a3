use crate::{
    api::{error::Result, types::DashboardResponse},
    domain::views::{self, FleetSnapshot},
    server::AppState,
};
use axum::{extract::State, Json};

pub async fn get_dashboard(State(state): State<AppState>) -> Result<Json<DashboardResponse>> {
    let now = state.clock.now();
    let snapshot = FleetSnapshot::load(&state.repositories).await?;
    let stats = views::dashboard_stats(&snapshot, now, state.config.billing.overdue_grace_minutes)?;

    Ok(Json(DashboardResponse {
        stats,
        availability: views::availability_by_type(&snapshot.vehicles),
        generated_at: now,
    }))
}
