//! External-collaborator contracts (spec.md §6). Concrete adapters live under
//! `persistence::repositories` (DB-backed) and right here for payment/notification
//! (SDK-backed, but specified only by the interface they expose — §1 Non-goals).

pub mod notification;
pub mod payment;
pub mod repositories;
