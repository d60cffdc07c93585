//! Storage and background-task infrastructure: the SQLite-backed stores for
//! events, alert rules, the delivery queue, dedup history, and the operator
//! audit trail, plus the three periodic background loops that sit on top of
//! them (rule evaluator, delivery dispatcher, retention worker).

pub mod audit;
pub mod backoff;
pub mod db;
pub mod dedup;
pub mod delivery_queue;
pub mod event_store;
pub mod rule_store;
pub mod workers;

pub use audit::{AuditRecord, AuditStats, OperatorAudit};
pub use db::{connect, Db};
pub use dedup::DedupHistory;
pub use delivery_queue::{DeliveryHistoryRecord, DeliveryOutcome, DeliveryQueue, DeliveryQueueEntry, DeliveryStats};
pub use event_store::{EventFilter, EventStats, EventStore};
pub use rule_store::{AlertRule, RuleStore};
