//! In-process broadcast of newly-stored events to live streaming subscribers.
//!
//! Grounded in the same `tokio::sync::broadcast` pattern this corpus's API
//! crate uses for its SSE stream (`realtime_tx` / `tenant_sse_stream`): one
//! broadcast channel shared by every subscriber, with per-subscriber lag
//! handled independently so one slow consumer never blocks another.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::Event;

/// Bounded per-subscriber capacity. A subscriber that falls this far behind
/// has events dropped for it specifically; the publisher is never blocked.
const SUBSCRIBER_CAPACITY: usize = 1000;

/// Broadcasts persisted events to connected streaming subscribers.
///
/// Holds no history: a subscriber only receives events published after it
/// subscribes. Publish failures (no subscribers) are not errors.
#[derive(Clone)]
pub struct FanoutHub {
    sender: broadcast::Sender<Arc<Event>>,
}

impl FanoutHub {
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self { sender }
    }

    /// Best-effort publish. Never fails the caller: if there are no
    /// subscribers this is a silent no-op, matching the ingestion
    /// contract's "fan-out failure never fails the ingestion" rule.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribes to all events tagged with `tenant_id`. Lagged
    /// notifications (queue overflow for this subscriber) are skipped
    /// rather than surfaced as stream errors — the slow consumer loses
    /// those events but the stream itself stays open.
    pub fn subscribe_tenant(
        &self,
        tenant_id: aether_core::TenantId,
    ) -> impl tokio_stream::Stream<Item = Arc<Event>> {
        let stream = BroadcastStream::new(self.sender.subscribe());
        stream.filter_map(move |item| match item {
            Ok(event) if event.tenant_id == tenant_id => Some(event),
            Ok(_) => None,
            Err(broadcast::error::RecvError::Lagged(_)) => None,
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for FanoutHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_core::{Severity, TenantId};
    use tokio_stream::StreamExt as _;

    fn sample_event(tenant: &str) -> Event {
        Event {
            row_id: None,
            event_id: "evt-1".to_string(),
            event_type: "svc.fail".to_string(),
            source: "test".to_string(),
            severity: Severity::Info,
            tenant_id: TenantId::new(tenant),
            timestamp: chrono::Utc::now(),
            received_at: chrono::Utc::now(),
            client_ip: None,
            payload: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn subscriber_only_receives_its_own_tenant() {
        let hub = FanoutHub::new();
        let mut stream = Box::pin(hub.subscribe_tenant(TenantId::new("a")));

        hub.publish(sample_event("b"));
        hub.publish(sample_event("a"));

        let received = stream.next().await.unwrap();
        assert_eq!(received.tenant_id, TenantId::new("a"));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let hub = FanoutHub::new();
        hub.publish(sample_event("a"));
    }
}
