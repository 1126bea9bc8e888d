//! Expiration Sweeper (C6): reclaims seats held by bookings whose 30-minute
//! hold window has lapsed. Grounded on the teacher's cooperative polling loop
//! pattern (no direct teacher equivalent existed for a background sweeper, so
//! this follows the same `tokio::time::interval` + `tokio::spawn` shape used
//! for the outbox publisher, per spec.md §4.4).

pub mod expiration_sweeper;

pub use expiration_sweeper::ExpirationSweeper;
