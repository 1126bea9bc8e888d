//! Outbox Publisher (C7): polls `event_outbox` and dispatches unpublished
//! entries to their event-type handlers. Grounded on Nova's
//! `transactional-outbox` crate for the poll/dispatch/mark-published shape,
//! per spec.md §4.5.

pub mod outbox_publisher;

pub use outbox_publisher::{EventHandler, OutboxPublisher};
