//! Inventory-engine and outbox-publisher metrics (spec.md §4.1, §4.5).
//!
//! Grounded on `runtime/src/metrics.rs` and `examples/ticketing/src/metrics.rs`
//! from the retrieval pack's composable-rust repo: a `register_*` function
//! calling `describe_counter!`/`describe_histogram!`/`describe_gauge!` once at
//! startup, plus small free functions wrapping the record call sites so the
//! metric name strings live in one place.

use metrics::{describe_counter, describe_gauge, describe_histogram};

pub fn register_core_metrics() {
    describe_counter!(
        "inventory_holds_total",
        "Total hold attempts processed by the inventory engine"
    );
    describe_counter!(
        "inventory_holds_succeeded_total",
        "Hold attempts that succeeded"
    );
    describe_counter!("inventory_holds_failed_total", "Hold attempts that failed");
    describe_counter!(
        "inventory_releases_total",
        "Total release attempts processed by the inventory engine"
    );
    describe_histogram!(
        "inventory_hold_latency_seconds",
        "End-to-end latency of a single hold request, queued or direct"
    );
    describe_histogram!(
        "inventory_batch_size",
        "Number of requests folded into one coalesced batch"
    );
    describe_gauge!(
        "inventory_queue_depth",
        "Current depth of the per-process inventory request queue"
    );
    describe_counter!(
        "outbox_published_total",
        "Outbox entries successfully dispatched"
    );
    describe_counter!(
        "outbox_failed_total",
        "Outbox dispatch attempts that failed and incremented retry_count"
    );
    describe_counter!(
        "outbox_abandoned_total",
        "Outbox entries that reached max_retries and were skipped"
    );
}

pub fn record_hold_attempt(succeeded: bool) {
    metrics::counter!("inventory_holds_total").increment(1);
    if succeeded {
        metrics::counter!("inventory_holds_succeeded_total").increment(1);
    } else {
        metrics::counter!("inventory_holds_failed_total").increment(1);
    }
}

pub fn record_release_attempt() {
    metrics::counter!("inventory_releases_total").increment(1);
}

pub fn record_hold_latency(seconds: f64) {
    metrics::histogram!("inventory_hold_latency_seconds").record(seconds);
}

pub fn record_batch_size(size: usize) {
    metrics::histogram!("inventory_batch_size").record(size as f64);
}

pub fn set_queue_depth(depth: usize) {
    metrics::gauge!("inventory_queue_depth").set(depth as f64);
}

pub fn record_outbox_published(count: usize) {
    metrics::counter!("outbox_published_total").increment(count as u64);
}

pub fn record_outbox_failed(count: usize) {
    metrics::counter!("outbox_failed_total").increment(count as u64);
}

pub fn record_outbox_abandoned(count: usize) {
    metrics::counter!("outbox_abandoned_total").increment(count as u64);
}
