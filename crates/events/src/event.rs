use aether_core::{Severity, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// An event as submitted by a producer, before server-side defaults are
/// applied. Every field but `event_type` is optional — `Ingestion` fills the
/// rest in per the defaulting rules.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub event_type: String,
    pub event_id: Option<String>,
    pub source: Option<String>,
    pub severity: Option<String>,
    pub tenant_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payload: JsonValue,
}

/// A fully-populated, persisted event. Immutable once written; this is the
/// shape returned by queries, broadcast over the fan-out hub, and embedded
/// verbatim as the webhook delivery body for synthetic alert events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The store's monotonic row id, the fan-out/pagination cursor. `None`
    /// for an event that hasn't been persisted yet.
    #[serde(default)]
    pub row_id: Option<i64>,
    pub event_id: String,
    pub event_type: String,
    pub source: String,
    pub severity: Severity,
    pub tenant_id: TenantId,
    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub client_ip: Option<String>,
    pub payload: JsonValue,
}

impl Event {
    /// Applies the ingestion defaulting rules to a caller-submitted event:
    /// timestamp/event_id/severity default when absent, tenant falls back to
    /// the request's tenant context and then `"system"`, `received_at` and
    /// `client_ip` are always stamped fresh.
    pub fn from_new(new_event: NewEvent, request_tenant: Option<&TenantId>) -> Self {
        let now = Utc::now();
        let tenant_id = new_event
            .tenant_id
            .map(TenantId::new)
            .or_else(|| request_tenant.cloned())
            .unwrap_or_default();
        Self {
            row_id: None,
            event_id: new_event.event_id.unwrap_or_else(|| uuid::Uuid::now_v7().to_string()),
            event_type: new_event.event_type,
            source: new_event.source.unwrap_or_else(|| "unknown".to_string()),
            severity: new_event
                .severity
                .and_then(|s| Severity::parse(&s))
                .unwrap_or_default(),
            tenant_id,
            timestamp: new_event.timestamp.unwrap_or(now),
            received_at: now,
            client_ip: None,
            payload: new_event.payload,
        }
    }

    /// Builds the synthetic `ops.alert.raised` event a tripped rule emits.
    pub fn alert_raised(
        tenant_id: TenantId,
        rule_id: i64,
        rule_name: &str,
        matched_count: i64,
        window_seconds: i64,
        threshold: i64,
        filters: JsonValue,
    ) -> Self {
        let now = Utc::now();
        Self {
            row_id: None,
            event_id: uuid::Uuid::now_v7().to_string(),
            event_type: "ops.alert.raised".to_string(),
            source: "aether-command-center".to_string(),
            severity: Severity::Critical,
            tenant_id,
            timestamp: now,
            received_at: now,
            client_ip: None,
            payload: serde_json::json!({
                "rule_name": rule_name,
                "rule_id": rule_id,
                "matched_count": matched_count,
                "window_seconds": window_seconds,
                "threshold": threshold,
                "filters": filters,
            }),
        }
    }

    /// Builds the synthetic `ops.alert.delivery.failed` dead-letter event.
    pub fn delivery_failed(
        tenant_id: TenantId,
        alert_event_id: &str,
        webhook_url: &str,
        attempts: i64,
        last_error: &str,
        alert_rule_name: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            row_id: None,
            event_id: uuid::Uuid::now_v7().to_string(),
            event_type: "ops.alert.delivery.failed".to_string(),
            source: "aether-command-center".to_string(),
            severity: Severity::Error,
            tenant_id,
            timestamp: now,
            received_at: now,
            client_ip: None,
            payload: serde_json::json!({
                "alert_event_id": alert_event_id,
                "webhook_url": webhook_url,
                "attempts": attempts,
                "last_error": last_error,
                "alert_rule_name": alert_rule_name,
            }),
        }
    }

    /// Builds the synthetic `ops.events.pruned` event the retention worker emits.
    pub fn events_pruned(scope: &str, pruned_count: i64, cutoff: DateTime<Utc>, retention_days: i64) -> Self {
        let now = Utc::now();
        Self {
            row_id: None,
            event_id: uuid::Uuid::now_v7().to_string(),
            event_type: "ops.events.pruned".to_string(),
            source: "aether-command-center".to_string(),
            severity: Severity::Info,
            tenant_id: TenantId::new(scope),
            timestamp: now,
            received_at: now,
            client_ip: None,
            payload: serde_json::json!({
                "scope": scope,
                "pruned_count": pruned_count,
                "cutoff": cutoff,
                "retention_days": retention_days,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_new_applies_the_defaulting_rules() {
        let submitted = NewEvent {
            event_type: "svc.deploy".to_string(),
            event_id: None,
            source: None,
            severity: None,
            tenant_id: None,
            timestamp: None,
            payload: serde_json::json!({"version": "1.2.3"}),
        };
        let event = Event::from_new(submitted, Some(&TenantId::new("acme")));
        assert!(!event.event_id.is_empty());
        assert_eq!(event.source, "unknown");
        assert_eq!(event.severity, Severity::Info);
        assert_eq!(event.tenant_id, TenantId::new("acme"));
        assert!(event.row_id.is_none());
    }

    #[test]
    fn from_new_prefers_an_explicit_tenant_over_the_request_context() {
        let submitted = NewEvent {
            event_type: "svc.deploy".to_string(),
            event_id: None,
            source: Some("svc-a".to_string()),
            severity: Some("warning".to_string()),
            tenant_id: Some("other-tenant".to_string()),
            timestamp: None,
            payload: serde_json::json!({}),
        };
        let event = Event::from_new(submitted, Some(&TenantId::new("acme")));
        assert_eq!(event.tenant_id, TenantId::new("other-tenant"));
        assert_eq!(event.severity, Severity::Warning);
    }

    #[test]
    fn alert_raised_carries_the_rule_tenant() {
        let event = Event::alert_raised(
            TenantId::new("acme"),
            7,
            "too-many-failures",
            5,
            60,
            3,
            serde_json::json!({}),
        );
        assert_eq!(event.tenant_id, TenantId::new("acme"));
        assert_eq!(event.event_type, "ops.alert.raised");
        assert_eq!(event.payload["matched_count"], 5);
        assert!(
            event.payload["matched_count"].as_i64().unwrap()
                >= event.payload["threshold"].as_i64().unwrap()
        );
    }
}
