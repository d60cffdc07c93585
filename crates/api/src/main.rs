use std::sync::Arc;

use aether_api::app::{self, AppState};
use aether_api::config::Config;
use aether_infra::workers::rule_evaluator::RuleEvaluatorConfig;
use aether_infra::workers::{dispatcher, retention, rule_evaluator};
use aether_infra::{DedupHistory, DeliveryQueue, EventStore, OperatorAudit, RuleStore};
use aether_events::FanoutHub;

#[tokio::main]
async fn main() {
    aether_observability::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "fatal startup error");
            std::process::exit(1);
        }
    };

    let db = match aether_infra::connect(&config.event_db_path).await {
        Ok(db) => db,
        Err(err) => {
            tracing::error!(error = %err, "fatal startup error");
            std::process::exit(1);
        }
    };

    let event_store = Arc::new(EventStore::new(db.clone()));
    let rule_store = Arc::new(RuleStore::new(db.clone()));
    let delivery_queue = Arc::new(DeliveryQueue::new(db.clone()));
    let dedup = Arc::new(DedupHistory::new(db.clone()));
    let audit = Arc::new(OperatorAudit::new(db.clone()));
    let hub = Arc::new(FanoutHub::new());

    let evaluator_config = RuleEvaluatorConfig {
        dedup_window_seconds: config.dedup_window_seconds,
        webhooks: config.alert_webhooks.clone(),
        max_delivery_attempts: config.max_delivery_attempts,
    };

    let evaluator_handle = rule_evaluator::spawn(
        rule_store.clone(),
        event_store.clone(),
        dedup.clone(),
        delivery_queue.clone(),
        hub.clone(),
        evaluator_config.clone(),
    );
    let dispatcher_handle = dispatcher::spawn(delivery_queue.clone(), event_store.clone(), hub.clone());
    let retention_handle = retention::spawn(
        event_store.clone(),
        hub.clone(),
        config.retention_days,
        config.retention_interval_seconds,
    );

    let state = AppState {
        event_store,
        rule_store,
        delivery_queue,
        dedup,
        audit,
        hub,
        evaluator_config,
    };

    let router = app::build_app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind {}: {err}", config.bind_addr));

    tracing::info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    tracing::info!("http listener stopped, shutting down background workers");
    evaluator_handle.shutdown().await;
    dispatcher_handle.shutdown().await;
    retention_handle.shutdown().await;
}

/// Resolves on Ctrl-C or SIGTERM, whichever comes first. Every background
/// loop observes the same cancellation at its next tick boundary.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
