//! Operator audit trail: every admin action against the Query & Admin API is
//! logged here, independent of the event store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use aether_core::CommandCenterError;

use crate::db::Db;

fn storage_err(e: sqlx::Error) -> CommandCenterError {
    CommandCenterError::storage(e.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub actor: String,
    pub action: String,
    pub target_id: Option<String>,
    pub metadata: serde_json::Value,
    pub source_ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStats {
    pub total_actions: i64,
    pub by_action: HashMap<String, i64>,
    pub top_actors: Vec<(String, i64)>,
    pub oldest_record: Option<DateTime<Utc>>,
    pub newest_record: Option<DateTime<Utc>>,
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<AuditRecord, sqlx::Error> {
    let metadata_text: String = row.try_get("metadata")?;
    Ok(AuditRecord {
        id: row.try_get("id")?,
        actor: row.try_get("actor")?,
        action: row.try_get("action")?,
        target_id: row.try_get("target_id")?,
        metadata: serde_json::from_str(&metadata_text).unwrap_or(serde_json::Value::Null),
        source_ip: row.try_get("source_ip")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Clone)]
pub struct OperatorAudit {
    db: Db,
}

impl OperatorAudit {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn log_action(
        &self,
        actor: &str,
        action: &str,
        target_id: Option<&str>,
        metadata: &serde_json::Value,
        source_ip: Option<&str>,
    ) -> Result<AuditRecord, CommandCenterError> {
        let now = Utc::now();
        let metadata_text = serde_json::to_string(metadata).map_err(|e| CommandCenterError::storage(e.to_string()))?;
        let id = sqlx::query(
            "INSERT INTO operator_audit (actor, action, target_id, metadata, source_ip, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(actor)
        .bind(action)
        .bind(target_id)
        .bind(metadata_text)
        .bind(source_ip)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(storage_err)?
        .last_insert_rowid();

        Ok(AuditRecord {
            id,
            actor: actor.to_string(),
            action: action.to_string(),
            target_id: target_id.map(|s| s.to_string()),
            metadata: metadata.clone(),
            source_ip: source_ip.map(|s| s.to_string()),
            created_at: now,
        })
    }

    pub async fn list(
        &self,
        limit: i64,
        actor: Option<&str>,
        action: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AuditRecord>, CommandCenterError> {
        let mut sql = String::from("SELECT * FROM operator_audit WHERE 1 = 1");
        if actor.is_some() {
            sql.push_str(" AND actor = ?");
        }
        if action.is_some() {
            sql.push_str(" AND action = ?");
        }
        if since.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        sql.push_str(" ORDER BY id DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(a) = actor {
            query = query.bind(a);
        }
        if let Some(a) = action {
            query = query.bind(a);
        }
        if let Some(s) = since {
            query = query.bind(s);
        }
        query = query.bind(limit);

        let rows = query.fetch_all(&self.db).await.map_err(storage_err)?;
        rows.into_iter().map(row_to_record).collect::<Result<_, _>>().map_err(storage_err)
    }

    /// Aggregate stats across the whole trail: total count, a per-action
    /// breakdown, the ten most active actors, and the oldest/newest records.
    pub async fn stats(&self) -> Result<AuditStats, CommandCenterError> {
        let total_actions: i64 = sqlx::query("SELECT COUNT(*) AS c FROM operator_audit")
            .fetch_one(&self.db)
            .await
            .map_err(storage_err)?
            .try_get("c")
            .map_err(storage_err)?;

        let by_action_rows = sqlx::query("SELECT action, COUNT(*) AS c FROM operator_audit GROUP BY action")
            .fetch_all(&self.db)
            .await
            .map_err(storage_err)?;
        let mut by_action = HashMap::new();
        for row in by_action_rows {
            let action: String = row.try_get("action").map_err(storage_err)?;
            let count: i64 = row.try_get("c").map_err(storage_err)?;
            by_action.insert(action, count);
        }

        let top_actor_rows = sqlx::query(
            "SELECT actor, COUNT(*) AS c FROM operator_audit GROUP BY actor ORDER BY c DESC LIMIT 10",
        )
        .fetch_all(&self.db)
        .await
        .map_err(storage_err)?;
        let top_actors = top_actor_rows
            .into_iter()
            .map(|row| -> Result<(String, i64), sqlx::Error> {
                Ok((row.try_get("actor")?, row.try_get("c")?))
            })
            .collect::<Result<_, _>>()
            .map_err(storage_err)?;

        let oldest_record: Option<DateTime<Utc>> = sqlx::query("SELECT MIN(created_at) AS m FROM operator_audit")
            .fetch_one(&self.db)
            .await
            .map_err(storage_err)?
            .try_get("m")
            .map_err(storage_err)?;
        let newest_record: Option<DateTime<Utc>> = sqlx::query("SELECT MAX(created_at) AS m FROM operator_audit")
            .fetch_one(&self.db)
            .await
            .map_err(storage_err)?
            .try_get("m")
            .map_err(storage_err)?;

        Ok(AuditStats {
            total_actions,
            by_action,
            top_actors,
            oldest_record,
            newest_record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Db {
        crate::db::connect(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn logs_and_lists_actions() {
        let db = test_db().await;
        let audit = OperatorAudit::new(db);
        audit
            .log_action("alice", "rule.disable", Some("42"), &serde_json::json!({}), Some("10.0.0.1"))
            .await
            .unwrap();
        audit
            .log_action("bob", "rule.create", None, &serde_json::json!({"name": "x"}), None)
            .await
            .unwrap();

        let all = audit.list(10, None, None, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let alice_only = audit.list(10, Some("alice"), None, None).await.unwrap();
        assert_eq!(alice_only.len(), 1);
    }

    #[tokio::test]
    async fn stats_summarize_the_trail() {
        let db = test_db().await;
        let audit = OperatorAudit::new(db);
        audit.log_action("alice", "rule.disable", None, &serde_json::json!({}), None).await.unwrap();
        audit.log_action("alice", "rule.enable", None, &serde_json::json!({}), None).await.unwrap();
        audit.log_action("bob", "rule.create", None, &serde_json::json!({}), None).await.unwrap();

        let stats = audit.stats().await.unwrap();
        assert_eq!(stats.total_actions, 3);
        assert_eq!(stats.by_action.get("rule.disable"), Some(&1));
        assert_eq!(stats.top_actors[0], ("alice".to_string(), 2));
        assert!(stats.oldest_record.is_some());
        assert!(stats.newest_record.is_some());
    }
}
