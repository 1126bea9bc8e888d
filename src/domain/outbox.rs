use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::events::DomainEvent;

/// A single outbox row (spec.md §3). Primary key `id`; the store additionally
/// indexes `(published_at IS NULL, created_at)` for the publisher's poll query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub event_type: String,
    pub aggregate_id: Uuid,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
}

impl OutboxEntry {
    /// Builds the outbox row for a domain event at the moment it is appended
    /// inside the owning write transaction (§4.2 invariant).
    pub fn from_event(event: &DomainEvent, now: DateTime<Utc>) -> Self {
        OutboxEntry {
            id: Uuid::new_v4(),
            event_type: event.event_type().to_string(),
            aggregate_id: event.aggregate_id(),
            payload: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
            created_at: now,
            published_at: None,
            retry_count: 0,
        }
    }
}
