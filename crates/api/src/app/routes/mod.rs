use axum::Router;

pub mod audit;
pub mod deliveries;
pub mod events;
pub mod rules;
pub mod system;

/// Router for every resource-area endpoint. Merged under the bare
/// `/ops/ping` route by `app::build_app`.
pub fn router() -> Router {
    Router::new()
        .merge(events::router())
        .merge(rules::router())
        .merge(deliveries::router())
        .merge(audit::router())
}
