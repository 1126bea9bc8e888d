//! Unit-of-work and repository implementations (C4/C5). Grounded on the
//! teacher's version-checked `UPDATE ... WHERE version = ?` retry loop
//! (`services/ticket_service.rs`), generalized from MySQL to the Postgres
//! runtime-checked sqlx API used across the retrieval pack's outbox/booking
//! examples (Nova's `transactional-outbox`, `booking_repo.rs`).

pub mod repositories;
pub mod unit_of_work;
