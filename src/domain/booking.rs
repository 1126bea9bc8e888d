use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use uuid::Uuid;

use crate::domain::events::DomainEvent;
use crate::domain::flight_inventory::{CabinClass, FlightId};
use crate::domain::money::Money;
use crate::domain::pnr::PnrCode;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, sqlx::Type)]
#[sqlx(transparent)]
pub struct BookingId(pub Uuid);

impl BookingId {
    pub fn new() -> Self {
        BookingId(Uuid::new_v4())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum PassengerType {
    Adult,
    Child,
    Infant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    pub id: Uuid,
    pub name: String,
    pub date_of_birth: chrono::NaiveDate,
    pub gender: Gender,
    pub passenger_type: PassengerType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSegment {
    pub id: Uuid,
    pub flight_id: FlightId,
    pub cabin: CabinClass,
    pub price: Money,
    pub seat_number: Option<String>,
}

/// Tagged-union state machine. Each transition is a method returning either the
/// next state or InvalidBookingState — avoids string-typed status mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Display, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum BookingStatus {
    Held,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Confirmed | BookingStatus::Cancelled | BookingStatus::Expired
        )
    }
}

/// Aggregate root, keyed by BookingId. Exclusively owns its passengers, segments
/// and pending events. PNR is immutable after construction.
#[derive(Debug, Clone)]
pub struct Booking {
    pub id: BookingId,
    pub pnr: PnrCode,
    pub status: BookingStatus,
    pub passengers: Vec<Passenger>,
    pub segments: Vec<BookingSegment>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub pending_events: Vec<DomainEvent>,
}

pub const HOLD_DURATION_MINUTES: i64 = 30;

impl Booking {
    /// Constructs a fresh Held booking. `passengers` must be non-empty and
    /// `segments` must be non-empty — callers (the saga) are expected to have
    /// validated this already; defensive checks live at the saga boundary.
    pub fn new_held(
        pnr: PnrCode,
        passengers: Vec<Passenger>,
        segments: Vec<BookingSegment>,
        now: DateTime<Utc>,
    ) -> Self {
        let id = BookingId::new();
        let mut booking = Booking {
            id,
            pnr: pnr.clone(),
            status: BookingStatus::Held,
            passengers,
            segments,
            version: 0,
            created_at: now,
            expires_at: Some(now + Duration::minutes(HOLD_DURATION_MINUTES)),
            pending_events: Vec::new(),
        };
        booking.pending_events.push(DomainEvent::BookingCreated {
            booking_id: id,
            pnr,
            occurred_at: now,
        });
        booking
    }

    fn require_held(&self) -> Result<(), AppError> {
        if self.status != BookingStatus::Held {
            return Err(AppError::InvalidBookingState {
                from: self.status,
                attempted: "confirm/cancel/expire",
            });
        }
        Ok(())
    }

    /// Held -> Confirmed. Only legal from Held; terminal states reject.
    pub fn confirm(&mut self, transaction_id: String, now: DateTime<Utc>) -> Result<(), AppError> {
        self.require_held()?;
        self.status = BookingStatus::Confirmed;
        self.expires_at = None;
        self.pending_events.push(DomainEvent::BookingConfirmed {
            booking_id: self.id,
            pnr: self.pnr.clone(),
            transaction_id,
            occurred_at: now,
        });
        Ok(())
    }

    /// Held -> Cancelled, with a reason (payment failure, caller-initiated cancel).
    pub fn cancel(&mut self, reason: String, now: DateTime<Utc>) -> Result<(), AppError> {
        self.require_held()?;
        self.status = BookingStatus::Cancelled;
        self.expires_at = None;
        self.pending_events.push(DomainEvent::BookingCancelled {
            booking_id: self.id,
            pnr: self.pnr.clone(),
            reason,
            occurred_at: now,
        });
        Ok(())
    }

    /// Held -> Expired, driven only by the sweeper.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.require_held()?;
        self.status = BookingStatus::Expired;
        self.expires_at = None;
        self.pending_events.push(DomainEvent::BookingExpired {
            booking_id: self.id,
            pnr: self.pnr.clone(),
            occurred_at: now,
        });
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Held && self.expires_at.map_or(false, |e| e < now)
    }

    pub fn total_price(&self) -> Option<Money> {
        let mut iter = self.segments.iter();
        let first = iter.next()?.price;
        iter.try_fold(first, |acc, seg| acc.add(seg.price).ok())
    }

    pub fn take_pending_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Currency;

    fn sample_booking() -> Booking {
        let passengers = vec![Passenger {
            id: Uuid::new_v4(),
            name: "Jane Doe".into(),
            date_of_birth: chrono::NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            gender: Gender::Female,
            passenger_type: PassengerType::Adult,
        }];
        let segments = vec![BookingSegment {
            id: Uuid::new_v4(),
            flight_id: FlightId::new(),
            cabin: CabinClass::Economy,
            price: Money::new(10000, Currency::EUR),
            seat_number: Some("12A".into()),
        }];
        Booking::new_held(PnrCode::generate(), passengers, segments, Utc::now())
    }

    #[test]
    fn new_booking_is_held_with_one_pending_event() {
        let b = sample_booking();
        assert_eq!(b.status, BookingStatus::Held);
        assert_eq!(b.pending_events.len(), 1);
        assert!(b.expires_at.is_some());
    }

    #[test]
    fn confirm_transitions_to_terminal_confirmed() {
        let mut b = sample_booking();
        b.confirm("txn_123".into(), Utc::now()).unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert!(b.status.is_terminal());
        assert!(b.expires_at.is_none());
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut b = sample_booking();
        b.cancel("declined".into(), Utc::now()).unwrap();
        assert!(matches!(
            b.confirm("txn".into(), Utc::now()),
            Err(AppError::InvalidBookingState { .. })
        ));
        assert!(matches!(
            b.expire(Utc::now()),
            Err(AppError::InvalidBookingState { .. })
        ));
    }

    #[test]
    fn is_expired_only_true_when_held_and_past_deadline() {
        let mut b = sample_booking();
        b.expires_at = Some(Utc::now() - Duration::seconds(1));
        assert!(b.is_expired(Utc::now()));
        b.confirm("txn".into(), Utc::now()).unwrap();
        assert!(!b.is_expired(Utc::now()));
    }
}
