//! The append-only event store: every accepted event lands here, ordered by
//! its monotonic row id, queryable by type/source/severity/tenant/recency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use aether_core::{CommandCenterError, Severity, TenantId};
use aether_events::Event;

use crate::db::Db;

fn storage_err(e: sqlx::Error) -> CommandCenterError {
    CommandCenterError::storage(e.to_string())
}

/// Optional filters applied to a recent-events query. `None` means
/// unfiltered on that dimension.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub event_type: Option<String>,
    pub source: Option<String>,
    pub severity: Option<String>,
    pub tenant_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStats {
    pub total: i64,
    pub last_24h: i64,
    pub by_severity: std::collections::HashMap<String, i64>,
}

fn row_to_event(row: sqlx::sqlite::SqliteRow) -> Result<Event, sqlx::Error> {
    let payload_text: String = row.try_get("payload")?;
    let severity_text: String = row.try_get("severity")?;
    let tenant_text: String = row.try_get("tenant_id")?;
    Ok(Event {
        row_id: Some(row.try_get("id")?),
        event_id: row.try_get("event_id")?,
        event_type: row.try_get("event_type")?,
        source: row.try_get("source")?,
        tenant_id: TenantId::new(tenant_text),
        severity: Severity::parse(&severity_text).unwrap_or_default(),
        timestamp: row.try_get("timestamp")?,
        payload: serde_json::from_str(&payload_text).unwrap_or(serde_json::Value::Null),
        received_at: row.try_get("received_at")?,
        client_ip: row.try_get("client_ip")?,
    })
}

/// Builds a `WHERE` clause and its ordered bind values for an `EventFilter`.
/// Shared between `query`, `count`, and `prune` so the predicate never
/// drifts between them.
fn build_predicate(filter: &EventFilter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();

    if let Some(t) = &filter.event_type {
        clauses.push("event_type = ?".to_string());
        binds.push(t.clone());
    }
    if let Some(s) = &filter.source {
        clauses.push("source = ?".to_string());
        binds.push(s.clone());
    }
    if let Some(s) = &filter.severity {
        clauses.push("severity = ?".to_string());
        binds.push(s.clone());
    }
    if let Some(t) = &filter.tenant_id {
        clauses.push("tenant_id = ?".to_string());
        binds.push(t.clone());
    }
    if let Some(since) = &filter.since {
        clauses.push("timestamp >= ?".to_string());
        binds.push(since.to_rfc3339());
    }

    if clauses.is_empty() {
        (String::new(), binds)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), binds)
    }
}

#[derive(Clone)]
pub struct EventStore {
    db: Db,
}

impl EventStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn save(&self, event: &Event) -> Result<i64, CommandCenterError> {
        let payload_text = serde_json::to_string(&event.payload).map_err(|e| CommandCenterError::storage(e.to_string()))?;
        let id = sqlx::query(
            r#"
            INSERT INTO events
                (event_id, event_type, source, tenant_id, severity, timestamp, payload, received_at, client_ip)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(&event.source)
        .bind(event.tenant_id.as_str())
        .bind(event.severity.as_str())
        .bind(event.timestamp)
        .bind(payload_text)
        .bind(event.received_at)
        .bind(&event.client_ip)
        .execute(&self.db)
        .await
        .map_err(storage_err)?
        .last_insert_rowid();
        Ok(id)
    }

    /// Most recent events matching `filter`, newest first, capped at `limit`.
    pub async fn query(&self, filter: &EventFilter, limit: i64) -> Result<Vec<Event>, CommandCenterError> {
        let (predicate, binds) = build_predicate(filter);
        let sql = format!("SELECT * FROM events{predicate} ORDER BY id DESC LIMIT ?");
        let mut query = sqlx::query(&sql);
        for bind in binds.clone() {
            query = query.bind(bind);
        }
        query = query.bind(limit);

        let rows = query.fetch_all(&self.db).await.map_err(storage_err)?;
        rows.into_iter().map(row_to_event).collect::<Result<_, _>>().map_err(storage_err)
    }

    pub async fn count(&self, filter: &EventFilter) -> Result<i64, CommandCenterError> {
        let (predicate, binds) = build_predicate(filter);
        let sql = format!("SELECT COUNT(*) AS c FROM events{predicate}");
        let mut query = sqlx::query(&sql);
        for bind in binds.clone() {
            query = query.bind(bind);
        }
        let row = query.fetch_one(&self.db).await.map_err(storage_err)?;
        row.try_get("c").map_err(storage_err)
    }

    pub async fn get_by_event_id(&self, event_id: &str) -> Result<Option<Event>, CommandCenterError> {
        let row = sqlx::query("SELECT * FROM events WHERE event_id = ?")
            .bind(event_id)
            .fetch_optional(&self.db)
            .await
            .map_err(storage_err)?;
        row.map(row_to_event).transpose().map_err(storage_err)
    }

    /// Overview counters used by the status/health surface: total rows,
    /// rows received in the last 24h, and a breakdown by severity.
    pub async fn stats(&self, tenant_id: Option<&str>) -> Result<EventStats, CommandCenterError> {
        let tenant_predicate = if tenant_id.is_some() { " WHERE tenant_id = ?" } else { "" };

        let total_sql = format!("SELECT COUNT(*) AS c FROM events{tenant_predicate}");
        let mut total_query = sqlx::query(&total_sql);
        if let Some(t) = tenant_id {
            total_query = total_query.bind(t);
        }
        let total: i64 = total_query.fetch_one(&self.db).await.map_err(storage_err)?.try_get("c").map_err(storage_err)?;

        let since = Utc::now() - chrono::Duration::hours(24);
        let last_24h_sql = if tenant_id.is_some() {
            "SELECT COUNT(*) AS c FROM events WHERE tenant_id = ? AND received_at >= ?"
        } else {
            "SELECT COUNT(*) AS c FROM events WHERE received_at >= ?"
        };
        let mut last_24h_query = sqlx::query(last_24h_sql);
        if let Some(t) = tenant_id {
            last_24h_query = last_24h_query.bind(t);
        }
        last_24h_query = last_24h_query.bind(since);
        let last_24h: i64 = last_24h_query.fetch_one(&self.db).await.map_err(storage_err)?.try_get("c").map_err(storage_err)?;

        let by_severity_sql = format!("SELECT severity, COUNT(*) AS c FROM events{tenant_predicate} GROUP BY severity");
        let mut by_severity_query = sqlx::query(&by_severity_sql);
        if let Some(t) = tenant_id {
            by_severity_query = by_severity_query.bind(t);
        }
        let rows = by_severity_query.fetch_all(&self.db).await.map_err(storage_err)?;
        let mut by_severity = std::collections::HashMap::new();
        for row in rows {
            let severity: String = row.try_get("severity").map_err(storage_err)?;
            let count: i64 = row.try_get("c").map_err(storage_err)?;
            by_severity.insert(severity, count);
        }

        Ok(EventStats { total, last_24h, by_severity })
    }

    /// Deletes events older than `cutoff`, optionally scoped to one tenant.
    /// Returns the number of rows removed.
    pub async fn prune(&self, cutoff: DateTime<Utc>, tenant_id: Option<&str>) -> Result<u64, CommandCenterError> {
        let result = if let Some(t) = tenant_id {
            sqlx::query("DELETE FROM events WHERE received_at < ? AND tenant_id = ?")
                .bind(cutoff)
                .bind(t)
                .execute(&self.db)
                .await
                .map_err(storage_err)?
        } else {
            sqlx::query("DELETE FROM events WHERE received_at < ?")
                .bind(cutoff)
                .execute(&self.db)
                .await
                .map_err(storage_err)?
        };
        Ok(result.rows_affected())
    }

    /// Distinct tenant ids seen in the event log, used to discover tenant
    /// scopes for the retention worker and admin overviews.
    pub async fn distinct_tenants(&self) -> Result<Vec<String>, CommandCenterError> {
        let rows = sqlx::query("SELECT DISTINCT tenant_id FROM events")
            .fetch_all(&self.db)
            .await
            .map_err(storage_err)?;
        rows.into_iter()
            .map(|row| row.try_get("tenant_id"))
            .collect::<Result<_, _>>()
            .map_err(storage_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_events::NewEvent;

    async fn test_db() -> Db {
        crate::db::connect(":memory:").await.unwrap()
    }

    fn sample_event(event_type: &str, tenant_id: &str) -> Event {
        Event::from_new(
            NewEvent {
                event_type: event_type.to_string(),
                event_id: None,
                source: Some("svc-a".to_string()),
                tenant_id: Some(tenant_id.to_string()),
                severity: Some("info".to_string()),
                timestamp: None,
                payload: serde_json::json!({}),
            },
            None,
        )
    }

    #[tokio::test]
    async fn save_and_query_round_trip() {
        let db = test_db().await;
        let store = EventStore::new(db);
        store.save(&sample_event("svc.deploy", "acme")).await.unwrap();
        store.save(&sample_event("svc.fail", "acme")).await.unwrap();
        store.save(&sample_event("svc.fail", "other")).await.unwrap();

        let filter = EventFilter { tenant_id: Some("acme".into()), ..Default::default() };
        let results = store.query(&filter, 50).await.unwrap();
        assert_eq!(results.len(), 2);

        let count = store.count(&filter).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn prune_respects_tenant_scope() {
        let db = test_db().await;
        let store = EventStore::new(db);
        store.save(&sample_event("svc.deploy", "acme")).await.unwrap();
        store.save(&sample_event("svc.deploy", "other")).await.unwrap();

        let future_cutoff = Utc::now() + chrono::Duration::seconds(60);
        let deleted = store.prune(future_cutoff, Some("acme")).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count(&EventFilter::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stats_reports_totals_and_severity_breakdown() {
        let db = test_db().await;
        let store = EventStore::new(db);
        store.save(&sample_event("svc.deploy", "acme")).await.unwrap();
        store.save(&sample_event("svc.fail", "acme")).await.unwrap();

        let stats = store.stats(Some("acme")).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.last_24h, 2);
    }
}
