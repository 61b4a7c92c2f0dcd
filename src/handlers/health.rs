use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{db, AppState};

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
}

/// Liveness probe with a database ping
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthStatus)
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    let database = match db::ping_database(&state.db).await {
        Ok(()) => "up",
        Err(_) => "down",
    };
    Json(HealthStatus {
        status: "up".to_string(),
        database: database.to_string(),
    })
}
