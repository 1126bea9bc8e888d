use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::booking::{Booking, BookingId};
use crate::domain::flight_inventory::{FlightId, FlightInventory};
use crate::domain::outbox::OutboxEntry;
use crate::domain::pnr::PnrCode;
use crate::domain::ticket::Ticket;
use crate::error::AppResult;

/// Port: Inventory Repository (§6). `save` is OCC-checked: the caller passes the
/// aggregate with the version it last read, and a conflict is reported as
/// `AppError::OptimisticLockConflict` rather than silently overwritten.
#[async_trait]
pub trait FlightInventoryRepository: Send + Sync {
    async fn get_by_flight_id(&self, flight_id: FlightId) -> AppResult<Option<FlightInventory>>;

    async fn save(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        inventory: &mut FlightInventory,
    ) -> AppResult<()>;

    async fn find_available_flights(
        &self,
        cabin: crate::domain::flight_inventory::CabinClass,
        min_seats: u32,
    ) -> AppResult<Vec<FlightInventory>>;
}

/// Port: Booking Repository (§6, §4.6). `findByPnr`/`findById` return `Option`;
/// the others return lists (open question in spec.md resolved in favor of Optional).
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_pnr(&self, pnr: &PnrCode) -> AppResult<Option<Booking>>;

    async fn find_by_id(&self, id: BookingId) -> AppResult<Option<Booking>>;

    async fn find_expired(&self, before: DateTime<Utc>, limit: i64) -> AppResult<Vec<Booking>>;

    async fn find_by_passenger_id(&self, passenger_id: Uuid) -> AppResult<Vec<Booking>>;

    /// Full-replaces passenger/segment child rows inside the same transaction as
    /// the OCC-checked `bookings` row write; appends `pending_events` to the
    /// outbox atomically, then clears them from the in-memory aggregate.
    async fn save(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        booking: &mut Booking,
    ) -> AppResult<()>;
}

/// Port: Ticket repository. Tickets are a separate aggregate (§3 Ownership).
#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn save(&self, tx: &mut Transaction<'_, Postgres>, ticket: &Ticket) -> AppResult<()>;

    async fn find_by_pnr(&self, pnr: &PnrCode) -> AppResult<Vec<Ticket>>;
}

/// Port: Outbox Repository (§6).
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn persist(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entries: &[OutboxEntry],
    ) -> AppResult<()>;

    async fn get_unpublished(&self, limit: i64, max_retries: i32) -> AppResult<Vec<OutboxEntry>>;

    async fn mark_as_published(&self, ids: &[Uuid]) -> AppResult<()>;

    async fn mark_as_failed(&self, ids: &[Uuid]) -> AppResult<()>;
}
