//! Prunes events older than the configured retention window, per tenant,
//! emitting an `ops.events.pruned` event for each scope it touches.

use std::sync::Arc;
use std::time::Duration;

use aether_events::{Event, FanoutHub};
use tokio::time::interval;
use tracing::{info, warn};

use crate::event_store::EventStore;

use super::WorkerHandle;

pub const DEFAULT_RETENTION_INTERVAL_SECONDS: u64 = 3600;

pub fn spawn(
    event_store: Arc<EventStore>,
    hub: Arc<FanoutHub>,
    retention_days: i64,
    interval_seconds: u64,
) -> WorkerHandle {
    WorkerHandle::spawn(move |mut shutdown| async move {
        let mut ticker = interval(Duration::from_secs(interval_seconds.max(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sweep_once(&event_store, &hub, retention_days).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("retention worker stopping");
                        break;
                    }
                }
            }
        }
    })
}

async fn sweep_once(event_store: &EventStore, hub: &FanoutHub, retention_days: i64) {
    let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days);

    let tenants = match event_store.distinct_tenants().await {
        Ok(tenants) => tenants,
        Err(err) => {
            warn!(error = %err, "failed to list tenants for retention sweep");
            return;
        }
    };

    for tenant in tenants {
        match event_store.prune(cutoff, Some(&tenant)).await {
            Ok(0) => {}
            Ok(pruned_count) => {
                info!(tenant_id = %tenant, pruned_count, "pruned events past retention window");
                let event = Event::events_pruned(&tenant, pruned_count as i64, cutoff, retention_days);
                if let Err(err) = event_store.save(&event).await {
                    warn!(error = %err, "failed to persist retention prune event");
                } else {
                    hub.publish(event);
                }
            }
            Err(err) => {
                warn!(tenant_id = %tenant, error = %err, "retention prune failed");
            }
        }
    }
}
