use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use sea_orm::{ConnectionTrait, Statement};
use serde::Serialize;
use std::time::Instant;
use tracing::warn;
use utoipa::ToSchema;

use crate::AppState;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub timestamp: String,
    pub database: ComponentStatus,
    pub database_latency_ms: Option<u64>,
}

/// Health probe. Reports degraded (503) when the database does not
/// answer a trivial query.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable")
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();
    let ping = state
        .db
        .execute(Statement::from_string(
            state.db.get_database_backend(),
            "SELECT 1".to_string(),
        ))
        .await;

    let (database, latency, overall, code) = match ping {
        Ok(_) => (
            ComponentStatus::Up,
            Some(started.elapsed().as_millis() as u64),
            ComponentStatus::Up,
            StatusCode::OK,
        ),
        Err(err) => {
            warn!(error = %err, "Health check database ping failed");
            (
                ComponentStatus::Down,
                None,
                ComponentStatus::Down,
                StatusCode::SERVICE_UNAVAILABLE,
            )
        }
    };

    (
        code,
        Json(HealthResponse {
            status: overall,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            database,
            database_latency_ms: latency,
        }),
    )
}
