//! Alert rule CRUD, backed by the `alert_rules` table.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use aether_core::CommandCenterError;

use crate::db::Db;

fn storage_err(e: sqlx::Error) -> CommandCenterError {
    CommandCenterError::storage(e.to_string())
}

/// A configured alert rule: trip when `threshold` matching events land
/// within `window_seconds`, optionally scoped to a tenant/event_type/source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: i64,
    pub name: String,
    pub severity: Option<String>,
    pub event_type: Option<String>,
    pub source: Option<String>,
    pub window_seconds: i64,
    pub threshold: i64,
    pub enabled: bool,
    pub tenant_id: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

/// Fields accepted when creating a new rule.
pub struct NewAlertRule {
    pub name: String,
    pub severity: Option<String>,
    pub event_type: Option<String>,
    pub source: Option<String>,
    pub window_seconds: i64,
    pub threshold: i64,
    pub tenant_id: Option<String>,
}

fn row_to_rule(row: sqlx::sqlite::SqliteRow) -> Result<AlertRule, sqlx::Error> {
    Ok(AlertRule {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        severity: row.try_get("severity")?,
        event_type: row.try_get("event_type")?,
        source: row.try_get("source")?,
        window_seconds: row.try_get("window_seconds")?,
        threshold: row.try_get("threshold")?,
        enabled: row.try_get::<i64, _>("enabled")? != 0,
        tenant_id: row.try_get("tenant_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Clone)]
pub struct RuleStore {
    db: Db,
}

impl RuleStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create(&self, rule: NewAlertRule) -> Result<AlertRule, CommandCenterError> {
        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO alert_rules
                (name, severity, event_type, source, window_seconds, threshold, enabled, tenant_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?, ?)
            "#,
        )
        .bind(&rule.name)
        .bind(&rule.severity)
        .bind(&rule.event_type)
        .bind(&rule.source)
        .bind(rule.window_seconds)
        .bind(rule.threshold)
        .bind(&rule.tenant_id)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(storage_err)?
        .last_insert_rowid();

        self.get(id).await?.ok_or_else(CommandCenterError::not_found)
    }

    pub async fn list(&self, tenant_id: Option<&str>) -> Result<Vec<AlertRule>, CommandCenterError> {
        let rows = match tenant_id {
            Some(t) => sqlx::query("SELECT * FROM alert_rules WHERE tenant_id = ? ORDER BY id DESC")
                .bind(t)
                .fetch_all(&self.db)
                .await
                .map_err(storage_err)?,
            None => sqlx::query("SELECT * FROM alert_rules ORDER BY id DESC")
                .fetch_all(&self.db)
                .await
                .map_err(storage_err)?,
        };
        rows.into_iter().map(row_to_rule).collect::<Result<_, _>>().map_err(storage_err)
    }

    /// Only rules currently enabled — what the evaluator loop iterates.
    pub async fn list_enabled(&self) -> Result<Vec<AlertRule>, CommandCenterError> {
        let rows = sqlx::query("SELECT * FROM alert_rules WHERE enabled = 1 ORDER BY id ASC")
            .fetch_all(&self.db)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(row_to_rule).collect::<Result<_, _>>().map_err(storage_err)
    }

    pub async fn get(&self, id: i64) -> Result<Option<AlertRule>, CommandCenterError> {
        let row = sqlx::query("SELECT * FROM alert_rules WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(storage_err)?;
        row.map(row_to_rule).transpose().map_err(storage_err)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, CommandCenterError> {
        let result = sqlx::query("DELETE FROM alert_rules WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    /// Flips `enabled`, preserving `created_at` and touching only `updated_at`.
    pub async fn set_enabled(&self, id: i64, enabled: bool) -> Result<Option<AlertRule>, CommandCenterError> {
        let result = sqlx::query("UPDATE alert_rules SET enabled = ?, updated_at = ? WHERE id = ?")
            .bind(enabled as i64)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Db {
        crate::db::connect(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_list_and_disable_a_rule() {
        let db = test_db().await;
        let store = RuleStore::new(db);

        let rule = store
            .create(NewAlertRule {
                name: "high error rate".into(),
                severity: Some("critical".into()),
                event_type: Some("svc.fail".into()),
                source: None,
                window_seconds: 300,
                threshold: 5,
                tenant_id: Some("acme".into()),
            })
            .await
            .unwrap();
        assert!(rule.enabled);

        let enabled = store.list_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);

        let updated = store.set_enabled(rule.id, false).await.unwrap().unwrap();
        assert!(!updated.enabled);
        assert_eq!(updated.created_at, rule.created_at);

        let enabled_after = store.list_enabled().await.unwrap();
        assert!(enabled_after.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let db = test_db().await;
        let store = RuleStore::new(db);
        let rule = store
            .create(NewAlertRule {
                name: "r".into(),
                severity: None,
                event_type: None,
                source: None,
                window_seconds: 60,
                threshold: 1,
                tenant_id: None,
            })
            .await
            .unwrap();

        assert!(store.delete(rule.id).await.unwrap());
        assert!(store.get(rule.id).await.unwrap().is_none());
        assert!(!store.delete(rule.id).await.unwrap());
    }
}
