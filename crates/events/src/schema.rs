//! The event schema registry: a write-once, process-wide constant table of
//! known event types and the fields ingestion requires for each. It is built
//! once at startup and never mutated afterward — there is no endpoint that
//! registers event types at runtime.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value as JsonValue;

/// Static metadata for one registered `event_type`.
#[derive(Debug, Clone)]
pub struct EventSchemaEntry {
    pub description: &'static str,
    pub required_payload_fields: &'static [&'static str],
}

/// Immutable lookup table of registered event types.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    entries: HashMap<&'static str, EventSchemaEntry>,
}

impl SchemaRegistry {
    pub fn lookup(&self, event_type: &str) -> Option<&EventSchemaEntry> {
        self.entries.get(event_type)
    }

    pub fn is_registered(&self, event_type: &str) -> bool {
        self.entries.contains_key(event_type)
    }

    /// Returns the names of required fields missing from `payload`, if any.
    pub fn missing_fields(&self, event_type: &str, payload: &JsonValue) -> Vec<&'static str> {
        let Some(entry) = self.lookup(event_type) else {
            return Vec::new();
        };
        entry
            .required_payload_fields
            .iter()
            .copied()
            .filter(|field| !payload.get(field).is_some_and(|v| !v.is_null()))
            .collect()
    }

    fn default_table() -> HashMap<&'static str, EventSchemaEntry> {
        let mut entries = HashMap::new();
        entries.insert(
            "svc.fail",
            EventSchemaEntry {
                description: "A producing service reported a failure.",
                required_payload_fields: &[],
            },
        );
        entries.insert(
            "svc.recovered",
            EventSchemaEntry {
                description: "A previously failing service recovered.",
                required_payload_fields: &[],
            },
        );
        entries.insert(
            "svc.deploy",
            EventSchemaEntry {
                description: "A deployment completed for a producing service.",
                required_payload_fields: &["version"],
            },
        );
        entries.insert(
            "svc.healthcheck.failed",
            EventSchemaEntry {
                description: "A scheduled health check failed.",
                required_payload_fields: &["endpoint"],
            },
        );
        entries.insert(
            "ops.alert.raised",
            EventSchemaEntry {
                description: "Synthetic event emitted when an alert rule trips.",
                required_payload_fields: &["rule_name", "rule_id", "matched_count", "threshold"],
            },
        );
        entries.insert(
            "ops.alert.delivery.failed",
            EventSchemaEntry {
                description: "Synthetic dead-letter event for an exhausted delivery.",
                required_payload_fields: &["alert_event_id", "webhook_url", "attempts"],
            },
        );
        entries.insert(
            "ops.events.pruned",
            EventSchemaEntry {
                description: "Synthetic event emitted after a retention sweep removed rows.",
                required_payload_fields: &["scope", "pruned_count"],
            },
        );
        entries
    }
}

static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();

/// Returns the process-wide schema registry, building it on first access.
pub fn registry() -> &'static SchemaRegistry {
    REGISTRY.get_or_init(|| SchemaRegistry {
        entries: SchemaRegistry::default_table(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_type_is_not_known() {
        assert!(!registry().is_registered("nonexistent.type"));
    }

    #[test]
    fn missing_required_field_is_reported() {
        let missing = registry().missing_fields("svc.deploy", &serde_json::json!({}));
        assert_eq!(missing, vec!["version"]);
    }

    #[test]
    fn present_required_field_is_not_reported() {
        let missing = registry().missing_fields("svc.deploy", &serde_json::json!({"version": "1.2.3"}));
        assert!(missing.is_empty());
    }

    #[test]
    fn unregistered_type_has_no_missing_fields_reported_here() {
        // Callers must check `is_registered` separately; an unknown type
        // trivially has no *registered* required fields to report.
        let missing = registry().missing_fields("nonexistent.type", &serde_json::json!({}));
        assert!(missing.is_empty());
    }
}
