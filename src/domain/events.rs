use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::booking::BookingId;
use crate::domain::flight_inventory::{CabinClass, FlightId};
use crate::domain::money::Money;
use crate::domain::pnr::PnrCode;

/// Domain events, one per aggregate mutation. Each carries a stable string tag
/// (`event_type`) used by the outbox and publisher dispatch table — never the
/// enum variant's Rust name, which would break across process boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum DomainEvent {
    SeatsHeld {
        flight_id: FlightId,
        cabin: CabinClass,
        seats: u32,
        unit_price: Money,
        occurred_at: DateTime<Utc>,
    },
    SeatsReleased {
        flight_id: FlightId,
        cabin: CabinClass,
        seats: u32,
        occurred_at: DateTime<Utc>,
    },
    BookingCreated {
        booking_id: BookingId,
        pnr: PnrCode,
        occurred_at: DateTime<Utc>,
    },
    BookingConfirmed {
        booking_id: BookingId,
        pnr: PnrCode,
        transaction_id: String,
        occurred_at: DateTime<Utc>,
    },
    BookingCancelled {
        booking_id: BookingId,
        pnr: PnrCode,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    BookingExpired {
        booking_id: BookingId,
        pnr: PnrCode,
        occurred_at: DateTime<Utc>,
    },
    TicketIssued {
        ticket_number: String,
        pnr: PnrCode,
        occurred_at: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Stable tag persisted in `event_outbox.event_type` and used to route dispatch.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::SeatsHeld { .. } => "SeatsHeld",
            DomainEvent::SeatsReleased { .. } => "SeatsReleased",
            DomainEvent::BookingCreated { .. } => "BookingCreated",
            DomainEvent::BookingConfirmed { .. } => "BookingConfirmed",
            DomainEvent::BookingCancelled { .. } => "BookingCancelled",
            DomainEvent::BookingExpired { .. } => "BookingExpired",
            DomainEvent::TicketIssued { .. } => "TicketIssued",
        }
    }

    /// The aggregate this event belongs to, for the outbox's `aggregate_id` column.
    pub fn aggregate_id(&self) -> Uuid {
        match self {
            DomainEvent::SeatsHeld { flight_id, .. } | DomainEvent::SeatsReleased { flight_id, .. } => {
                flight_id.0
            }
            DomainEvent::BookingCreated { booking_id, .. }
            | DomainEvent::BookingConfirmed { booking_id, .. }
            | DomainEvent::BookingCancelled { booking_id, .. }
            | DomainEvent::BookingExpired { booking_id, .. } => booking_id.0,
            DomainEvent::TicketIssued { pnr, .. } => {
                // Tickets are a separate aggregate keyed by ticket number, but the
                // outbox indexes by the owning booking's PNR-derived namespace so
                // downstream projections can join on it; we reuse a deterministic
                // UUID derived from the PNR since tickets carry no own UUID PK.
                Uuid::new_v5(&Uuid::NAMESPACE_OID, pnr.as_str().as_bytes())
            }
        }
    }
}
