//! Delivery queue visibility, delivery history, and manual replay.

use axum::extract::{Extension, Path, Query};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use aether_auth::{PrincipalContext, TenantContext};
use aether_core::CommandCenterError;

use crate::app::errors::ApiError;
use crate::app::{audit_actor, require_admin_or_operator, AppState};

pub fn router() -> Router {
    Router::new()
        .route("/alerts/deliveries", get(pending))
        .route("/alerts/deliveries/stats", get(stats))
        .route("/alerts/deliveries/history", get(history))
        .route("/alerts/deliveries/:id/replay", post(replay))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

const DEFAULT_LIMIT: i64 = 100;

async fn pending(
    Extension(state): Extension<AppState>,
    Query(params): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.delivery_queue.list_pending(params.limit.unwrap_or(DEFAULT_LIMIT)).await?;
    Ok(Json(entries))
}

async fn stats(Extension(state): Extension<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.delivery_queue.stats().await?;
    Ok(Json(stats))
}

async fn history(
    Extension(state): Extension<AppState>,
    Query(params): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let records = state.delivery_queue.history(params.limit.unwrap_or(DEFAULT_LIMIT)).await?;
    Ok(Json(records))
}

/// Synthesizes a new pending queue entry from a completed or dead-lettered
/// history record, at attempt_count 0, due immediately. Writes both the
/// `replayed` history marker (in `DeliveryQueue::replay`) and the operator
/// audit record required for every admin mutation.
async fn replay(
    Extension(state): Extension<AppState>,
    Extension(tenant_ctx): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin_or_operator(&principal)?;

    let history_record = state.delivery_queue.get_history(id).await?.ok_or(CommandCenterError::NotFound)?;
    let new_delivery_id = state.delivery_queue.replay(&history_record).await?;

    state
        .audit
        .log_action(
            &audit_actor(&tenant_ctx, &principal),
            "operator.replay",
            Some(&history_record.delivery_id.to_string()),
            &serde_json::json!({"new_delivery_id": new_delivery_id}),
            None,
        )
        .await?;

    Ok(Json(serde_json::json!({"status": "replayed", "new_delivery_id": new_delivery_id})))
}
