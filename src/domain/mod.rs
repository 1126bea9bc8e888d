//! Pure domain model: no I/O, no sqlx pools, no Rocket types beyond deriving
//! `JsonSchema`/`Serialize` for the outer API layer to reuse. Grounded on the
//! teacher's `src/models/*.rs` split, generalized to the aggregates of spec.md §3.

pub mod booking;
pub mod events;
pub mod flight_inventory;
pub mod money;
pub mod outbox;
pub mod pnr;
pub mod ticket;
