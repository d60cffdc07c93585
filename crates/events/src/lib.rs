//! The event model: the shape persisted by the store, the static schema
//! registry that gates ingestion, and the in-process fan-out hub that
//! mirrors newly-stored events to live streaming subscribers.

mod event;
mod hub;
mod schema;

pub use event::{Event, NewEvent};
pub use hub::FanoutHub;
pub use schema::{registry, EventSchemaEntry, SchemaRegistry};
