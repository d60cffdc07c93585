//! Read-only access to the operator audit trail.

use axum::extract::{Extension, Query};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::app::errors::ApiError;
use crate::app::AppState;

pub fn router() -> Router {
    Router::new()
        .route("/audit/operator", get(list))
        .route("/audit/operator/stats", get(stats))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
    pub actor: Option<String>,
    pub action: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

const DEFAULT_LIMIT: i64 = 100;

async fn list(
    Extension(state): Extension<AppState>,
    Query(params): Query<AuditQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let records = state
        .audit
        .list(params.limit.unwrap_or(DEFAULT_LIMIT), params.actor.as_deref(), params.action.as_deref(), params.since)
        .await?;
    Ok(Json(records))
}

async fn stats(Extension(state): Extension<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.audit.stats().await?;
    Ok(Json(stats))
}
