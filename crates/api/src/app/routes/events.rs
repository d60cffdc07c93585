//! Event ingestion, recent-event query, stats, and the live SSE stream.

use axum::extract::{Extension, Query};
use axum::http::HeaderMap;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::time::Duration;

use aether_auth::{PrincipalContext, TenantContext};
use aether_core::CommandCenterError;
use aether_events::{registry, Event, NewEvent};
use aether_infra::EventFilter;
use tokio_stream::StreamExt;

use crate::app::errors::ApiError;
use crate::app::{scoped_tenant, AppState};

pub fn router() -> Router {
    Router::new()
        .route("/events/publish", post(publish))
        .route("/events/recent", get(recent))
        .route("/events/stats", get(stats))
        .route("/events/stream", get(stream))
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validates `event_type` against the schema registry, applies the
/// ingestion defaulting rules, stamps `received_at`/`client_ip`, persists,
/// and best-effort fans the event out to live subscribers. Fan-out failure
/// never fails the ingestion — `FanoutHub::publish` cannot itself error.
async fn publish(
    Extension(state): Extension<AppState>,
    Extension(tenant_ctx): Extension<TenantContext>,
    headers: HeaderMap,
    Json(new_event): Json<NewEvent>,
) -> Result<impl IntoResponse, ApiError> {
    let schema_registry = registry();
    if !schema_registry.is_registered(&new_event.event_type) {
        return Err(ApiError(CommandCenterError::validation(format!(
            "unknown event_type: {}",
            new_event.event_type
        ))));
    }

    let missing = schema_registry.missing_fields(&new_event.event_type, &new_event.payload);
    if !missing.is_empty() {
        return Err(ApiError(CommandCenterError::validation(format!(
            "missing required payload fields: {}",
            missing.join(", ")
        ))));
    }

    let mut event = Event::from_new(new_event, Some(tenant_ctx.tenant_id()));
    event.client_ip = client_ip(&headers);

    state.event_store.save(&event).await?;
    state.hub.publish(event.clone());

    Ok(Json(serde_json::json!({
        "status": "accepted",
        "event_id": event.event_id,
        "received_at": event.received_at,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
    pub event_type: Option<String>,
    pub source: Option<String>,
    pub tenant_id: Option<String>,
    pub severity: Option<String>,
    pub since: Option<chrono::DateTime<chrono::Utc>>,
}

const DEFAULT_RECENT_LIMIT: i64 = 50;
const MAX_RECENT_LIMIT: i64 = 1000;

async fn recent(
    Extension(state): Extension<AppState>,
    Extension(tenant_ctx): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(params): Query<RecentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = scoped_tenant(&tenant_ctx, &principal, params.tenant_id.as_deref())?;
    let filter = EventFilter {
        event_type: params.event_type,
        source: params.source,
        severity: params.severity,
        tenant_id: Some(tenant_id.as_str().to_string()),
        since: params.since,
    };
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, MAX_RECENT_LIMIT);
    let events = state.event_store.query(&filter, limit).await?;
    Ok(Json(events))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub tenant_id: Option<String>,
}

async fn stats(
    Extension(state): Extension<AppState>,
    Extension(tenant_ctx): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(params): Query<StatsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = scoped_tenant(&tenant_ctx, &principal, params.tenant_id.as_deref())?;
    let stats = state.event_store.stats(Some(tenant_id.as_str())).await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub tenant_id: Option<String>,
}

/// Long-lived SSE connection, one JSON-encoded event per frame. No replay:
/// a subscriber only ever sees events published after it connects.
async fn stream(
    Extension(state): Extension<AppState>,
    Extension(tenant_ctx): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(params): Query<StreamQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<SseEvent, std::convert::Infallible>>>, ApiError> {
    let tenant_id = scoped_tenant(&tenant_ctx, &principal, params.tenant_id.as_deref())?;
    let events = state.hub.subscribe_tenant(tenant_id);
    let frames = events.map(|event| {
        let data = serde_json::to_string(&*event).unwrap_or_else(|_| "{}".to_string());
        Ok(SseEvent::default().data(data))
    });

    Ok(Sse::new(frames).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
