//! The reliable delivery pipeline's durable queue: one row per
//! (alert, webhook) pairing awaiting dispatch, plus the history table that
//! records what ultimately happened to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use aether_core::CommandCenterError;

use crate::db::Db;

fn storage_err(e: sqlx::Error) -> CommandCenterError {
    CommandCenterError::storage(e.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryQueueEntry {
    pub id: i64,
    pub alert_event_id: String,
    pub alert_payload: serde_json::Value,
    pub webhook_url: String,
    pub attempt_count: i64,
    pub max_attempts: i64,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    DeadLettered,
    Replayed,
}

impl DeliveryOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::DeadLettered => "dead_lettered",
            Self::Replayed => "replayed",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "delivered" => Self::Delivered,
            "replayed" => Self::Replayed,
            _ => Self::DeadLettered,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub pending: i64,
    pub delivered: i64,
    pub dead_lettered: i64,
    pub replayed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryHistoryRecord {
    pub id: i64,
    pub delivery_id: i64,
    pub alert_event_id: String,
    pub webhook_url: String,
    pub alert_payload: serde_json::Value,
    pub outcome: DeliveryOutcome,
    pub attempt_count: i64,
    pub last_error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

fn row_to_entry(row: sqlx::sqlite::SqliteRow) -> Result<DeliveryQueueEntry, sqlx::Error> {
    let payload_text: String = row.try_get("alert_payload")?;
    Ok(DeliveryQueueEntry {
        id: row.try_get("id")?,
        alert_event_id: row.try_get("alert_event_id")?,
        alert_payload: serde_json::from_str(&payload_text).unwrap_or(serde_json::Value::Null),
        webhook_url: row.try_get("webhook_url")?,
        attempt_count: row.try_get("attempt_count")?,
        max_attempts: row.try_get("max_attempts")?,
        next_attempt_at: row.try_get("next_attempt_at")?,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_history(row: sqlx::sqlite::SqliteRow) -> Result<DeliveryHistoryRecord, sqlx::Error> {
    let outcome: String = row.try_get("outcome")?;
    let payload_text: String = row.try_get("alert_payload")?;
    Ok(DeliveryHistoryRecord {
        id: row.try_get("id")?,
        delivery_id: row.try_get("delivery_id")?,
        alert_event_id: row.try_get("alert_event_id")?,
        webhook_url: row.try_get("webhook_url")?,
        alert_payload: serde_json::from_str(&payload_text).unwrap_or(serde_json::Value::Null),
        outcome: DeliveryOutcome::from_str(&outcome),
        attempt_count: row.try_get("attempt_count")?,
        last_error: row.try_get("last_error")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[derive(Clone)]
pub struct DeliveryQueue {
    db: Db,
}

impl DeliveryQueue {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Enqueues one pending delivery for a single webhook target. Due
    /// immediately — `next_attempt_at` is now.
    pub async fn enqueue(
        &self,
        alert_event_id: &str,
        alert_payload: &serde_json::Value,
        webhook_url: &str,
        max_attempts: i64,
    ) -> Result<i64, CommandCenterError> {
        let now = Utc::now();
        let payload_text = serde_json::to_string(alert_payload).map_err(|e| CommandCenterError::storage(e.to_string()))?;
        let id = sqlx::query(
            r#"
            INSERT INTO delivery_queue
                (alert_event_id, alert_payload, webhook_url, attempt_count, max_attempts, next_attempt_at, created_at, updated_at)
            VALUES (?, ?, ?, 0, ?, ?, ?, ?)
            "#,
        )
        .bind(alert_event_id)
        .bind(payload_text)
        .bind(webhook_url)
        .bind(max_attempts)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(storage_err)?
        .last_insert_rowid();
        Ok(id)
    }

    /// Rows due for an attempt right now, oldest first, capped at `limit`.
    pub async fn fetch_due(&self, limit: i64) -> Result<Vec<DeliveryQueueEntry>, CommandCenterError> {
        let rows = sqlx::query("SELECT * FROM delivery_queue WHERE next_attempt_at <= ? ORDER BY id ASC LIMIT ?")
            .bind(Utc::now())
            .bind(limit)
            .fetch_all(&self.db)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(row_to_entry).collect::<Result<_, _>>().map_err(storage_err)
    }

    /// Delivery succeeded: remove the row and append a `Delivered` history
    /// record, in one transaction.
    pub async fn mark_success(&self, entry: &DeliveryQueueEntry) -> Result<(), CommandCenterError> {
        let mut tx = self.db.begin().await.map_err(storage_err)?;
        sqlx::query("DELETE FROM delivery_queue WHERE id = ?")
            .bind(entry.id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        insert_history(&mut tx, entry, DeliveryOutcome::Delivered, entry.attempt_count + 1, None).await?;
        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    /// Delivery failed. If the new attempt count reaches `max_attempts` the
    /// row is removed and dead-lettered into history; otherwise the row is
    /// rescheduled for `next_attempt_at` with the error recorded.
    pub async fn mark_failure(
        &self,
        entry: &DeliveryQueueEntry,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<bool, CommandCenterError> {
        let new_attempt_count = entry.attempt_count + 1;
        let dead_lettered = new_attempt_count >= entry.max_attempts;

        let mut tx = self.db.begin().await.map_err(storage_err)?;
        if dead_lettered {
            sqlx::query("DELETE FROM delivery_queue WHERE id = ?")
                .bind(entry.id)
                .execute(&mut *tx)
                .await
                .map_err(storage_err)?;
            insert_history(&mut tx, entry, DeliveryOutcome::DeadLettered, new_attempt_count, Some(error)).await?;
        } else {
            sqlx::query(
                "UPDATE delivery_queue SET attempt_count = ?, next_attempt_at = ?, last_error = ?, updated_at = ? WHERE id = ?",
            )
            .bind(new_attempt_count)
            .bind(next_attempt_at)
            .bind(error)
            .bind(Utc::now())
            .bind(entry.id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }
        tx.commit().await.map_err(storage_err)?;
        Ok(dead_lettered)
    }

    pub async fn list_pending(&self, limit: i64) -> Result<Vec<DeliveryQueueEntry>, CommandCenterError> {
        let rows = sqlx::query("SELECT * FROM delivery_queue ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.db)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(row_to_entry).collect::<Result<_, _>>().map_err(storage_err)
    }

    /// Overview counters for the delivery-stats surface: current queue depth
    /// plus lifetime outcome counts drawn from history.
    pub async fn stats(&self) -> Result<DeliveryStats, CommandCenterError> {
        let pending: i64 = sqlx::query("SELECT COUNT(*) AS c FROM delivery_queue")
            .fetch_one(&self.db)
            .await
            .map_err(storage_err)?
            .try_get("c")
            .map_err(storage_err)?;

        let rows = sqlx::query("SELECT outcome, COUNT(*) AS c FROM delivery_history GROUP BY outcome")
            .fetch_all(&self.db)
            .await
            .map_err(storage_err)?;

        let mut stats = DeliveryStats { pending, delivered: 0, dead_lettered: 0, replayed: 0 };
        for row in rows {
            let outcome: String = row.try_get("outcome").map_err(storage_err)?;
            let count: i64 = row.try_get("c").map_err(storage_err)?;
            match DeliveryOutcome::from_str(&outcome) {
                DeliveryOutcome::Delivered => stats.delivered = count,
                DeliveryOutcome::DeadLettered => stats.dead_lettered = count,
                DeliveryOutcome::Replayed => stats.replayed = count,
            }
        }
        Ok(stats)
    }

    /// Looks up one history record by id, used to resolve a replay target.
    pub async fn get_history(&self, id: i64) -> Result<Option<DeliveryHistoryRecord>, CommandCenterError> {
        let row = sqlx::query("SELECT * FROM delivery_history WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(storage_err)?;
        row.map(row_to_history).transpose().map_err(storage_err)
    }

    pub async fn history(&self, limit: i64) -> Result<Vec<DeliveryHistoryRecord>, CommandCenterError> {
        let rows = sqlx::query("SELECT * FROM delivery_history ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.db)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(row_to_history).collect::<Result<_, _>>().map_err(storage_err)
    }

    /// Re-queues a dead-lettered (or completed) delivery: inserts a fresh
    /// pending row carrying the original alert payload, due immediately,
    /// with attempt_count reset to zero, and appends a `Replayed` marker to
    /// the original history record's trail.
    pub async fn replay(&self, history_record: &DeliveryHistoryRecord) -> Result<i64, CommandCenterError> {
        let now = Utc::now();
        let payload_text =
            serde_json::to_string(&history_record.alert_payload).map_err(|e| CommandCenterError::storage(e.to_string()))?;
        let id = sqlx::query(
            r#"
            INSERT INTO delivery_queue
                (alert_event_id, alert_payload, webhook_url, attempt_count, max_attempts, next_attempt_at, created_at, updated_at)
            VALUES (?, ?, ?, 0, 5, ?, ?, ?)
            "#,
        )
        .bind(&history_record.alert_event_id)
        .bind(payload_text)
        .bind(&history_record.webhook_url)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(storage_err)?
        .last_insert_rowid();

        let replay_payload_text =
            serde_json::to_string(&history_record.alert_payload).map_err(|e| CommandCenterError::storage(e.to_string()))?;
        sqlx::query(
            "INSERT INTO delivery_history (delivery_id, alert_event_id, webhook_url, alert_payload, outcome, attempt_count, last_error, completed_at) VALUES (?, ?, ?, ?, ?, 0, NULL, ?)",
        )
        .bind(history_record.delivery_id)
        .bind(&history_record.alert_event_id)
        .bind(&history_record.webhook_url)
        .bind(replay_payload_text)
        .bind(DeliveryOutcome::Replayed.as_str())
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(storage_err)?;

        Ok(id)
    }
}

async fn insert_history(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    entry: &DeliveryQueueEntry,
    outcome: DeliveryOutcome,
    attempt_count: i64,
    error: Option<&str>,
) -> Result<(), CommandCenterError> {
    let payload_text =
        serde_json::to_string(&entry.alert_payload).map_err(|e| CommandCenterError::storage(e.to_string()))?;
    sqlx::query(
        "INSERT INTO delivery_history (delivery_id, alert_event_id, webhook_url, alert_payload, outcome, attempt_count, last_error, completed_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.id)
    .bind(&entry.alert_event_id)
    .bind(&entry.webhook_url)
    .bind(payload_text)
    .bind(outcome.as_str())
    .bind(attempt_count)
    .bind(error)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await
    .map_err(storage_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_db() -> Db {
        crate::db::connect(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn success_removes_row_and_records_history() {
        let db = test_db().await;
        let queue = DeliveryQueue::new(db);
        let payload = serde_json::json!({"ok": true});
        queue.enqueue("evt-1", &payload, "https://example.com/hook", 5).await.unwrap();

        let due = queue.fetch_due(10).await.unwrap();
        assert_eq!(due.len(), 1);

        queue.mark_success(&due[0]).await.unwrap();
        assert!(queue.fetch_due(10).await.unwrap().is_empty());

        let history = queue.history(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, DeliveryOutcome::Delivered);
    }

    #[tokio::test]
    async fn failure_reschedules_until_max_attempts_then_dead_letters() {
        let db = test_db().await;
        let queue = DeliveryQueue::new(db);
        let payload = serde_json::json!({});
        queue.enqueue("evt-2", &payload, "https://example.com/hook", 2).await.unwrap();

        let mut entry = queue.fetch_due(10).await.unwrap().remove(0);
        let dead = queue
            .mark_failure(&entry, "timeout", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();
        assert!(!dead);

        entry = queue.fetch_due(10).await.unwrap().remove(0);
        assert_eq!(entry.attempt_count, 1);

        let dead = queue
            .mark_failure(&entry, "timeout again", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();
        assert!(dead);
        assert!(queue.fetch_due(10).await.unwrap().is_empty());

        let history = queue.history(10).await.unwrap();
        assert_eq!(history[0].outcome, DeliveryOutcome::DeadLettered);
    }

    #[tokio::test]
    async fn replay_carries_forward_the_original_alert_payload() {
        let db = test_db().await;
        let queue = DeliveryQueue::new(db);
        let payload = serde_json::json!({"event_type": "ops.alert.raised", "payload": {"rule_name": "r"}});
        queue.enqueue("evt-3", &payload, "https://example.com/hook", 1).await.unwrap();

        let entry = queue.fetch_due(10).await.unwrap().remove(0);
        queue.mark_failure(&entry, "boom", Utc::now() - Duration::seconds(1)).await.unwrap();

        let history = queue.history(10).await.unwrap();
        let dead_lettered = &history[0];
        assert_eq!(dead_lettered.outcome, DeliveryOutcome::DeadLettered);
        assert_eq!(dead_lettered.alert_payload, payload);

        let new_id = queue.replay(dead_lettered).await.unwrap();
        let due = queue.fetch_due(10).await.unwrap();
        let replayed_entry = due.iter().find(|e| e.id == new_id).unwrap();
        assert_eq!(replayed_entry.attempt_count, 0);
        assert_eq!(replayed_entry.alert_payload, payload);
    }
}
