//! Inventory Engine (C2): per-flight hold/release coalescing over an
//! OCC-guarded store. Grounded on the teacher's version-checked retry loop in
//! `services/ticket_service.rs` for the compare-and-swap shape, generalized
//! into a queue + direct-path design per spec.md §4.1/§5.

pub mod engine;

pub use engine::{HoldResult, InventoryEngine, ReleaseResult};
