//! Shared exponential back-off with jitter, used by the inventory engine,
//! booking saga, expiration sweeper and outbox publisher wherever spec.md
//! calls for "retry with exponential back-off + jitter" (§4.1, §4.3, §4.4).

use std::time::Duration;

use rand::Rng;

/// Doubles `base` per attempt up to `cap`, then adds up to half of the capped
/// value as jitter. `attempt` is 1-indexed.
pub fn backoff_with_jitter(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt.min(10));
    let capped = exp.min(cap);
    let jitter_ms = rand::thread_rng().gen_range(0..=(capped.as_millis() as u64 / 2 + 1));
    capped + Duration::from_millis(jitter_ms)
}
