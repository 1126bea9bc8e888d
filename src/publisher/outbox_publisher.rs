use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::domain::outbox::OutboxEntry;
use crate::error::AppResult;
use crate::ports::repositories::OutboxRepository;

/// A dispatch target for one `event_type` (spec.md §4.5 "dispatch to the
/// appropriate handler"). Real handlers might forward to a message bus, call
/// a downstream service, or write to an audit log; the publisher only knows
/// how to route by tag and record the outcome.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, entry: &OutboxEntry) -> AppResult<()>;
}

/// Logs the event and succeeds. Used for event types with no registered
/// handler so the publisher never stalls on an unrecognized `event_type`.
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle(&self, entry: &OutboxEntry) -> AppResult<()> {
        info!(event_type = %entry.event_type, aggregate_id = %entry.aggregate_id, "outbox event dispatched");
        Ok(())
    }
}

/// Polls `event_outbox` and dispatches unpublished entries to their
/// registered handler, by `event_type` (spec.md §4.5).
pub struct OutboxPublisher {
    repo: Arc<dyn OutboxRepository>,
    handlers: HashMap<String, Arc<dyn EventHandler>>,
    default_handler: Arc<dyn EventHandler>,
    poll_interval: Duration,
    batch_size: i64,
    max_retries: i32,
}

impl OutboxPublisher {
    pub fn new(
        repo: Arc<dyn OutboxRepository>,
        handlers: HashMap<String, Arc<dyn EventHandler>>,
        poll_interval: Duration,
        batch_size: i64,
        max_retries: i32,
    ) -> Self {
        OutboxPublisher {
            repo,
            handlers,
            default_handler: Arc::new(LoggingEventHandler),
            poll_interval,
            batch_size,
            max_retries,
        }
    }

    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.poll_interval);
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }

    /// One publish tick (spec.md §4.5): fetch up to `batch_size` unpublished,
    /// under-`max_retries` entries and dispatch each independently.
    pub async fn run_once(&self) {
        let entries = match self.repo.get_unpublished(self.batch_size, self.max_retries).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "outbox publisher failed to query unpublished entries");
                return;
            }
        };

        if entries.is_empty() {
            return;
        }

        let mut published = Vec::new();
        let mut failed = Vec::new();

        for entry in &entries {
            let handler = self
                .handlers
                .get(entry.event_type.as_str())
                .unwrap_or(&self.default_handler);

            match handler.handle(entry).await {
                Ok(()) => published.push(entry.id),
                Err(e) => {
                    warn!(
                        error = %e,
                        event_type = %entry.event_type,
                        entry_id = %entry.id,
                        retry_count = entry.retry_count,
                        "outbox entry dispatch failed"
                    );
                    failed.push(entry.id);
                }
            }
        }

        if !published.is_empty() {
            if let Err(e) = self.repo.mark_as_published(&published).await {
                error!(error = %e, "failed to mark outbox entries as published");
            } else {
                crate::metrics::record_outbox_published(published.len());
            }
        }
        if !failed.is_empty() {
            if let Err(e) = self.repo.mark_as_failed(&failed).await {
                error!(error = %e, "failed to increment retry_count on failed outbox entries");
            } else {
                crate::metrics::record_outbox_failed(failed.len());
            }
        }

        let abandoned = entries
            .iter()
            .filter(|e| e.retry_count + 1 >= self.max_retries && failed.contains(&e.id))
            .count();
        if abandoned > 0 {
            crate::metrics::record_outbox_abandoned(abandoned);
            warn!(count = abandoned, "outbox entries reached max_retries and will be skipped");
        }
    }
}
