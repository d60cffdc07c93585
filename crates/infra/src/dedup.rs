//! De-duplication window tracking: suppresses re-raising the same alert rule
//! for the same tenant while a prior trip is still within its window.

use chrono::{DateTime, Duration, Utc};
use sqlx::Row;

use aether_core::CommandCenterError;

use crate::db::Db;

fn storage_err(e: sqlx::Error) -> CommandCenterError {
    CommandCenterError::storage(e.to_string())
}

#[derive(Clone)]
pub struct DedupHistory {
    db: Db,
}

impl DedupHistory {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// True if this rule has already fired for this tenant within the last
    /// `window_seconds` and should therefore be suppressed.
    pub async fn is_suppressed(
        &self,
        rule_name: &str,
        tenant_id: &str,
        window_seconds: i64,
    ) -> Result<bool, CommandCenterError> {
        let row = sqlx::query("SELECT last_enqueued_at FROM dedup_history WHERE rule_name = ? AND tenant_id = ?")
            .bind(rule_name)
            .bind(tenant_id)
            .fetch_optional(&self.db)
            .await
            .map_err(storage_err)?;

        let Some(row) = row else {
            return Ok(false);
        };
        let last: DateTime<Utc> = row.try_get("last_enqueued_at").map_err(storage_err)?;
        Ok(Utc::now() - last < Duration::seconds(window_seconds))
    }

    /// Records that this rule just fired for this tenant, resetting the
    /// window's clock.
    pub async fn record_fired(&self, rule_name: &str, tenant_id: &str) -> Result<(), CommandCenterError> {
        sqlx::query(
            r#"
            INSERT INTO dedup_history (rule_name, tenant_id, last_enqueued_at)
            VALUES (?, ?, ?)
            ON CONFLICT(rule_name, tenant_id) DO UPDATE SET last_enqueued_at = excluded.last_enqueued_at
            "#,
        )
        .bind(rule_name)
        .bind(tenant_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Db {
        crate::db::connect(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn fresh_rule_is_never_suppressed() {
        let db = test_db().await;
        let dedup = DedupHistory::new(db);
        assert!(!dedup.is_suppressed("rule-a", "acme", 300).await.unwrap());
    }

    #[tokio::test]
    async fn firing_suppresses_within_the_window_and_clears_after() {
        let db = test_db().await;
        let dedup = DedupHistory::new(db);
        dedup.record_fired("rule-a", "acme").await.unwrap();

        assert!(dedup.is_suppressed("rule-a", "acme", 300).await.unwrap());
        assert!(!dedup.is_suppressed("rule-a", "acme", 0).await.unwrap());
        assert!(!dedup.is_suppressed("rule-a", "other-tenant", 300).await.unwrap());
    }
}
