//! Alert rule CRUD and the one-shot synchronous evaluation trigger.

use axum::extract::{Extension, Path, Query};
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use aether_auth::{PrincipalContext, TenantContext};
use aether_core::CommandCenterError;
use aether_infra::rule_store::NewAlertRule;
use aether_infra::workers::rule_evaluator::evaluate_rules_once;

use crate::app::errors::ApiError;
use crate::app::{audit_actor, require_admin_or_operator, scoped_tenant, AppState};

pub fn router() -> Router {
    Router::new()
        .route("/alerts/rules", post(create).get(list))
        .route("/alerts/rules/:id", get(get_one).delete(remove))
        .route("/alerts/rules/:id/enabled", patch(set_enabled))
        .route("/alerts/evaluate", post(evaluate))
}

#[derive(Debug, Deserialize)]
pub struct NewRuleBody {
    pub name: String,
    pub severity: Option<String>,
    pub event_type: Option<String>,
    pub source: Option<String>,
    pub window_seconds: i64,
    pub threshold: i64,
    pub tenant_id: Option<String>,
}

/// A rule is valid iff `window_seconds > 0`, `threshold > 0`, and any
/// supplied `severity` is one of the four canonical levels.
fn validate_new_rule(body: &NewRuleBody) -> Result<(), CommandCenterError> {
    if body.window_seconds <= 0 {
        return Err(CommandCenterError::validation("window_seconds must be positive"));
    }
    if body.threshold <= 0 {
        return Err(CommandCenterError::validation("threshold must be positive"));
    }
    if let Some(severity) = &body.severity {
        if aether_core::Severity::parse(severity).is_none() {
            return Err(CommandCenterError::validation(format!("unknown severity: {severity}")));
        }
    }
    Ok(())
}

async fn create(
    Extension(state): Extension<AppState>,
    Extension(tenant_ctx): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewRuleBody>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin_or_operator(&principal)?;
    validate_new_rule(&body)?;

    let tenant_id = body.tenant_id.or_else(|| Some(tenant_ctx.tenant_id().to_string()));
    let rule = state
        .rule_store
        .create(NewAlertRule {
            name: body.name,
            severity: body.severity,
            event_type: body.event_type,
            source: body.source,
            window_seconds: body.window_seconds,
            threshold: body.threshold,
            tenant_id,
        })
        .await?;

    state
        .audit
        .log_action(
            &audit_actor(&tenant_ctx, &principal),
            "rule.create",
            Some(&rule.id.to_string()),
            &serde_json::json!({"name": rule.name}),
            None,
        )
        .await?;

    Ok(Json(rule))
}

#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    pub tenant_id: Option<String>,
}

async fn list(
    Extension(state): Extension<AppState>,
    Extension(tenant_ctx): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(params): Query<TenantQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = scoped_tenant(&tenant_ctx, &principal, params.tenant_id.as_deref())?;
    let rules = state.rule_store.list(Some(tenant_id.as_str())).await?;
    Ok(Json(rules))
}

async fn get_one(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let rule = state.rule_store.get(id).await?.ok_or(CommandCenterError::NotFound)?;
    Ok(Json(rule))
}

async fn remove(
    Extension(state): Extension<AppState>,
    Extension(tenant_ctx): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin_or_operator(&principal)?;

    let deleted = state.rule_store.delete(id).await?;
    if !deleted {
        return Err(ApiError(CommandCenterError::NotFound));
    }

    state
        .audit
        .log_action(&audit_actor(&tenant_ctx, &principal), "rule.delete", Some(&id.to_string()), &serde_json::json!({}), None)
        .await?;

    Ok(Json(serde_json::json!({"status": "deleted"})))
}

#[derive(Debug, Deserialize)]
pub struct EnabledQuery {
    pub enabled: bool,
}

async fn set_enabled(
    Extension(state): Extension<AppState>,
    Extension(tenant_ctx): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<i64>,
    Query(params): Query<EnabledQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin_or_operator(&principal)?;

    let rule = state
        .rule_store
        .set_enabled(id, params.enabled)
        .await?
        .ok_or(CommandCenterError::NotFound)?;

    let action = if params.enabled { "rule.enable" } else { "rule.disable" };
    state
        .audit
        .log_action(&audit_actor(&tenant_ctx, &principal), action, Some(&id.to_string()), &serde_json::json!({}), None)
        .await?;

    Ok(Json(rule))
}

/// Invokes the exact same evaluation routine the periodic rule evaluator
/// calls on its 15-second cycle, so a manually triggered run can never
/// diverge in behavior from the scheduled one.
async fn evaluate(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin_or_operator(&principal)?;

    evaluate_rules_once(
        &state.rule_store,
        &state.event_store,
        &state.dedup,
        &state.delivery_queue,
        &state.hub,
        &state.evaluator_config,
    )
    .await;

    Ok(Json(serde_json::json!({"status": "evaluated"})))
}
