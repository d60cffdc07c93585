//! HTTP application wiring: shared state, middleware layering, and the
//! route tree.
//!
//! - `errors.rs`: `CommandCenterError` -> HTTP response mapping
//! - `routes/`: one module per resource area

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use aether_auth::{PrincipalContext, ScopeError, TenantContext};
use aether_core::{CommandCenterError, TenantId};
use aether_infra::workers::rule_evaluator::RuleEvaluatorConfig;
use aether_infra::{DedupHistory, DeliveryQueue, EventStore, OperatorAudit, RuleStore};
use aether_events::FanoutHub;

use crate::middleware;

pub mod errors;
pub mod routes;

/// Every store and shared collaborator a handler might need, bundled once
/// at startup and cheaply cloned (every field is itself an `Arc` or a
/// `Clone`-cheap value) into each request.
#[derive(Clone)]
pub struct AppState {
    pub event_store: Arc<EventStore>,
    pub rule_store: Arc<RuleStore>,
    pub delivery_queue: Arc<DeliveryQueue>,
    pub dedup: Arc<DedupHistory>,
    pub audit: Arc<OperatorAudit>,
    pub hub: Arc<FanoutHub>,
    pub evaluator_config: RuleEvaluatorConfig,
}

/// Resolves the tenant a request should operate against, per the uniform
/// scoping rule: admin/operator may override via query parameter, everyone
/// else is forced to the tenant resolved from the request context header.
pub fn scoped_tenant(
    tenant_ctx: &TenantContext,
    principal: &PrincipalContext,
    requested_tenant: Option<&str>,
) -> Result<TenantId, CommandCenterError> {
    aether_auth::resolve_tenant_scope(tenant_ctx, principal, requested_tenant).map_err(|err| match err {
        ScopeError::TenantOverrideDenied => CommandCenterError::forbidden(err.to_string()),
    })
}

/// Fails with `Forbidden` unless the caller holds `admin` or `operator`.
pub fn require_admin_or_operator(principal: &PrincipalContext) -> Result<(), CommandCenterError> {
    if principal.roles().is_admin_or_operator() {
        Ok(())
    } else {
        Err(CommandCenterError::forbidden("caller's role does not permit this action"))
    }
}

/// The actor identity recorded on an audit record: there is no separate
/// principal id in this system, so the tenant plus the caller's roles
/// stand in for it.
pub fn audit_actor(tenant_ctx: &TenantContext, principal: &PrincipalContext) -> String {
    let roles = principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>().join(",");
    if roles.is_empty() {
        tenant_ctx.tenant_id().to_string()
    } else {
        format!("{}:{}", tenant_ctx.tenant_id(), roles)
    }
}

/// Builds the full HTTP router.
pub fn build_app(state: AppState) -> Router {
    let protected = routes::router().layer(Extension(state));

    Router::new()
        .route("/ops/ping", get(routes::system::ping))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::auth_middleware)))
}
