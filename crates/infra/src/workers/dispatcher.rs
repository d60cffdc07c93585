//! Reliable delivery: dequeues due webhook attempts and POSTs them, retrying
//! with backoff and dead-lettering once a delivery exhausts its attempts.

use std::sync::Arc;
use std::time::Duration;

use aether_core::TenantId;
use aether_events::{Event, FanoutHub};
use tokio::time::interval;
use tracing::{info, warn};

use crate::backoff::delay_for_attempt;
use crate::delivery_queue::{DeliveryQueue, DeliveryQueueEntry};
use crate::event_store::EventStore;

use super::WorkerHandle;

const DISPATCH_INTERVAL: Duration = Duration::from_secs(30);
const STARTUP_DELAY: Duration = Duration::from_secs(10);
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const BATCH_SIZE: i64 = 50;

pub fn spawn(
    delivery_queue: Arc<DeliveryQueue>,
    event_store: Arc<EventStore>,
    hub: Arc<FanoutHub>,
) -> WorkerHandle {
    WorkerHandle::spawn(move |mut shutdown| async move {
        tokio::select! {
            _ = tokio::time::sleep(STARTUP_DELAY) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }

        let client = match reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                warn!(error = %err, "failed to build delivery dispatcher http client, dispatcher disabled");
                return;
            }
        };

        let mut ticker = interval(DISPATCH_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    dispatch_due_once(&client, &delivery_queue, &event_store, &hub).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("delivery dispatcher stopping");
                        break;
                    }
                }
            }
        }
    })
}

async fn dispatch_due_once(
    client: &reqwest::Client,
    delivery_queue: &DeliveryQueue,
    event_store: &EventStore,
    hub: &FanoutHub,
) {
    let due = match delivery_queue.fetch_due(BATCH_SIZE).await {
        Ok(entries) => entries,
        Err(err) => {
            warn!(error = %err, "failed to fetch due deliveries");
            return;
        }
    };

    for entry in due {
        dispatch_one(client, delivery_queue, event_store, hub, entry).await;
    }
}

async fn dispatch_one(
    client: &reqwest::Client,
    delivery_queue: &DeliveryQueue,
    event_store: &EventStore,
    hub: &FanoutHub,
    entry: DeliveryQueueEntry,
) {
    let result = client
        .post(&entry.webhook_url)
        .json(&entry.alert_payload)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            if let Err(err) = delivery_queue.mark_success(&entry).await {
                warn!(delivery_id = entry.id, error = %err, "failed to record successful delivery");
            }
        }
        Ok(response) => {
            let error = format!("webhook returned status {}", response.status());
            handle_failure(delivery_queue, event_store, hub, entry, &error).await;
        }
        Err(err) => {
            let error = if err.is_timeout() {
                "webhook request timed out".to_string()
            } else {
                format!("webhook request failed: {err}")
            };
            handle_failure(delivery_queue, event_store, hub, entry, &error).await;
        }
    }
}

async fn handle_failure(
    delivery_queue: &DeliveryQueue,
    event_store: &EventStore,
    hub: &FanoutHub,
    entry: DeliveryQueueEntry,
    error: &str,
) {
    let next_attempt_number = entry.attempt_count + 1;
    let next_attempt_at = chrono::Utc::now() + delay_for_attempt(next_attempt_number);

    let dead_lettered = match delivery_queue.mark_failure(&entry, error, next_attempt_at).await {
        Ok(dead_lettered) => dead_lettered,
        Err(err) => {
            warn!(delivery_id = entry.id, error = %err, "failed to record delivery failure");
            return;
        }
    };

    if dead_lettered {
        warn!(
            delivery_id = entry.id,
            webhook_url = %entry.webhook_url,
            attempts = next_attempt_number,
            error,
            "delivery exhausted retries, dead-lettering"
        );

        let tenant_id = TenantId::SYSTEM.to_string();
        let dead_letter = Event::delivery_failed(
            TenantId::new(tenant_id),
            &entry.alert_event_id,
            &entry.webhook_url,
            next_attempt_number,
            error,
            alert_rule_name_from_payload(&entry.alert_payload),
        );
        if let Err(err) = event_store.save(&dead_letter).await {
            warn!(error = %err, "failed to persist dead-letter event");
        } else {
            hub.publish(dead_letter);
        }
    } else {
        info!(
            delivery_id = entry.id,
            webhook_url = %entry.webhook_url,
            attempt = next_attempt_number,
            next_attempt_at = %next_attempt_at,
            "delivery failed, retry scheduled"
        );
    }
}

fn alert_rule_name_from_payload(payload: &serde_json::Value) -> &str {
    payload
        .get("payload")
        .and_then(|p| p.get("rule_name"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
}
