//! Evaluates every enabled alert rule on a fixed cadence, raising
//! `ops.alert.raised` events and enqueueing webhook deliveries for the rules
//! that trip.

use std::sync::Arc;
use std::time::Duration;

use aether_core::TenantId;
use aether_events::{Event, FanoutHub};
use tokio::time::interval;
use tracing::{info, warn};

use crate::dedup::DedupHistory;
use crate::delivery_queue::DeliveryQueue;
use crate::event_store::{EventFilter, EventStore};
use crate::rule_store::{AlertRule, RuleStore};

use super::WorkerHandle;

const EVALUATION_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct RuleEvaluatorConfig {
    pub dedup_window_seconds: i64,
    pub webhooks: Vec<String>,
    pub max_delivery_attempts: i64,
}

pub fn spawn(
    rule_store: Arc<RuleStore>,
    event_store: Arc<EventStore>,
    dedup: Arc<DedupHistory>,
    delivery_queue: Arc<DeliveryQueue>,
    hub: Arc<FanoutHub>,
    config: RuleEvaluatorConfig,
) -> WorkerHandle {
    WorkerHandle::spawn(move |mut shutdown| async move {
        let mut ticker = interval(EVALUATION_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    evaluate_rules_once(&rule_store, &event_store, &dedup, &delivery_queue, &hub, &config).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("rule evaluator stopping");
                        break;
                    }
                }
            }
        }
    })
}

/// One evaluation pass across every enabled rule. Never propagates a single
/// rule's error — a storage hiccup on one rule must not stop the others from
/// being checked this tick.
///
/// Also the routine `POST /alerts/evaluate` invokes directly for a
/// synchronous one-shot run, so admin-triggered and scheduled evaluation can
/// never diverge in behavior.
pub async fn evaluate_rules_once(
    rule_store: &RuleStore,
    event_store: &EventStore,
    dedup: &DedupHistory,
    delivery_queue: &DeliveryQueue,
    hub: &FanoutHub,
    config: &RuleEvaluatorConfig,
) {
    let rules = match rule_store.list_enabled().await {
        Ok(rules) => rules,
        Err(err) => {
            warn!(error = %err, "failed to list enabled alert rules");
            return;
        }
    };

    for rule in rules {
        if let Err(err) = evaluate_rule(&rule, event_store, dedup, delivery_queue, hub, config).await {
            warn!(rule_id = rule.id, rule_name = %rule.name, error = %err, "alert rule evaluation failed");
        }
    }
}

async fn evaluate_rule(
    rule: &AlertRule,
    event_store: &EventStore,
    dedup: &DedupHistory,
    delivery_queue: &DeliveryQueue,
    hub: &FanoutHub,
    config: &RuleEvaluatorConfig,
) -> Result<(), aether_core::CommandCenterError> {
    let since = chrono::Utc::now() - chrono::Duration::seconds(rule.window_seconds);
    let filter = EventFilter {
        event_type: rule.event_type.clone(),
        source: rule.source.clone(),
        severity: rule.severity.clone(),
        tenant_id: rule.tenant_id.clone(),
        since: Some(since),
    };
    let matched_count = event_store.count(&filter).await?;

    if matched_count < rule.threshold {
        return Ok(());
    }

    let dedup_tenant = rule.tenant_id.clone().unwrap_or_else(|| TenantId::SYSTEM.to_string());

    let tenant_id = TenantId::new(dedup_tenant.clone());
    let filters = serde_json::json!({
        "event_type": rule.event_type,
        "source": rule.source,
        "severity": rule.severity,
    });
    let alert_event = Event::alert_raised(
        tenant_id.clone(),
        rule.id,
        &rule.name,
        matched_count,
        rule.window_seconds,
        rule.threshold,
        filters,
    );

    // The alert is always persisted and observable on the stream, even when
    // dedup suppresses re-enqueueing the webhook deliveries below.
    event_store.save(&alert_event).await?;
    let payload = serde_json::to_value(&alert_event).unwrap_or(serde_json::Value::Null);
    hub.publish(alert_event.clone());

    if dedup.is_suppressed(&rule.name, &dedup_tenant, config.dedup_window_seconds).await? {
        info!(
            rule_id = rule.id,
            rule_name = %rule.name,
            matched_count,
            threshold = rule.threshold,
            "alert rule tripped again within dedup window, suppressing delivery re-enqueue"
        );
        return Ok(());
    }

    for webhook_url in &config.webhooks {
        if let Err(err) = delivery_queue
            .enqueue(&alert_event.event_id, &payload, webhook_url, config.max_delivery_attempts)
            .await
        {
            warn!(webhook_url, error = %err, "failed to enqueue alert delivery");
        }
    }

    dedup.record_fired(&rule.name, &dedup_tenant).await?;

    info!(
        rule_id = rule.id,
        rule_name = %rule.name,
        matched_count,
        threshold = rule.threshold,
        "alert rule tripped"
    );

    Ok(())
}
