use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use sqlx::PgPool;

use crate::db;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    database: String,
    version: &'static str,
}

pub async fn root() -> &'static str {
    "Sofin API Server"
}

/// Health check endpoint
pub async fn health_check(State(pool): State<PgPool>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status, database) = match db::check_health(&pool).await {
        Ok(()) => (StatusCode::OK, "healthy", "connected".to_string()),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", e.to_string()),
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
