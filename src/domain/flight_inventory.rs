use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumIter};
use uuid::Uuid;

use crate::domain::events::DomainEvent;
use crate::domain::money::Money;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, sqlx::Type)]
#[sqlx(transparent)]
pub struct FlightId(pub Uuid);

impl FlightId {
    pub fn new() -> Self {
        FlightId(Uuid::new_v4())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Display, EnumIter, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum CabinClass {
    Economy,
    Business,
    First,
}

/// Per-cabin seat pool. Invariant: 0 <= available <= capacity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct SeatBucket {
    pub available: u32,
    pub capacity: u32,
    pub price: Money,
}

impl SeatBucket {
    pub fn new(capacity: u32, price: Money) -> Self {
        SeatBucket {
            available: capacity,
            capacity,
            price,
        }
    }

    fn hold(&mut self, n: u32) -> Result<(), AppError> {
        if n > self.available {
            return Err(AppError::FlightFull);
        }
        self.available -= n;
        Ok(())
    }

    fn release(&mut self, n: u32) -> Result<(), AppError> {
        if self.available + n > self.capacity {
            return Err(AppError::OverCapacity {
                capacity: self.capacity,
                attempted: self.available + n,
            });
        }
        self.available += n;
        Ok(())
    }
}

/// Aggregate root, keyed by FlightId. Owns its per-cabin seat buckets exclusively.
#[derive(Debug, Clone)]
pub struct FlightInventory {
    pub flight_id: FlightId,
    pub availability: HashMap<CabinClass, SeatBucket>,
    pub version: i64,
    pub pending_events: Vec<DomainEvent>,
    pub last_updated: DateTime<Utc>,
}

impl FlightInventory {
    pub fn seed(flight_id: FlightId, availability: HashMap<CabinClass, SeatBucket>) -> Self {
        FlightInventory {
            flight_id,
            availability,
            version: 0,
            pending_events: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// Holds `n` seats in `cabin`. On success decrements `available` and records
    /// a SeatsHeld event; on failure the snapshot is untouched.
    pub fn hold_seats(&mut self, cabin: CabinClass, n: u32) -> Result<Money, AppError> {
        if n == 0 {
            return Err(AppError::InvalidAmount(n));
        }
        let bucket = self
            .availability
            .get_mut(&cabin)
            .ok_or(AppError::FlightNotFound)?;
        let unit_price = bucket.price;
        bucket.hold(n)?;
        self.pending_events.push(DomainEvent::SeatsHeld {
            flight_id: self.flight_id,
            cabin,
            seats: n,
            unit_price,
            occurred_at: Utc::now(),
        });
        Ok(unit_price)
    }

    /// Releases `n` seats back into `cabin`. `available + n > capacity` is an
    /// OverCapacity error — it means the caller is releasing more than was held.
    pub fn release_seats(&mut self, cabin: CabinClass, n: u32) -> Result<(), AppError> {
        if n == 0 {
            return Err(AppError::InvalidAmount(n));
        }
        let bucket = self
            .availability
            .get_mut(&cabin)
            .ok_or(AppError::FlightNotFound)?;
        bucket.release(n)?;
        self.pending_events.push(DomainEvent::SeatsReleased {
            flight_id: self.flight_id,
            cabin,
            seats: n,
            occurred_at: Utc::now(),
        });
        Ok(())
    }

    pub fn unit_price(&self, cabin: CabinClass) -> Result<Money, AppError> {
        self.availability
            .get(&cabin)
            .map(|b| b.price)
            .ok_or(AppError::FlightNotFound)
    }

    /// Clears pending events after a successful save (repository contract, §4.6).
    pub fn take_pending_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Currency;

    fn seed_economy(capacity: u32) -> FlightInventory {
        let mut map = HashMap::new();
        map.insert(
            CabinClass::Economy,
            SeatBucket::new(capacity, Money::new(10000, Currency::EUR)),
        );
        FlightInventory::seed(FlightId::new(), map)
    }

    #[test]
    fn hold_then_release_round_trips_availability() {
        let mut inv = seed_economy(100);
        inv.hold_seats(CabinClass::Economy, 5).unwrap();
        assert_eq!(inv.availability[&CabinClass::Economy].available, 95);
        inv.release_seats(CabinClass::Economy, 5).unwrap();
        assert_eq!(inv.availability[&CabinClass::Economy].available, 100);
    }

    #[test]
    fn hold_beyond_available_fails_without_mutating() {
        let mut inv = seed_economy(1);
        let err = inv.hold_seats(CabinClass::Economy, 2).unwrap_err();
        assert!(matches!(err, AppError::FlightFull));
        assert_eq!(inv.availability[&CabinClass::Economy].available, 1);
    }

    #[test]
    fn release_beyond_capacity_fails() {
        let mut inv = seed_economy(5);
        inv.hold_seats(CabinClass::Economy, 1).unwrap();
        let err = inv.release_seats(CabinClass::Economy, 2).unwrap_err();
        assert!(matches!(err, AppError::OverCapacity { .. }));
    }

    #[test]
    fn zero_amount_is_rejected() {
        let mut inv = seed_economy(5);
        assert!(matches!(
            inv.hold_seats(CabinClass::Economy, 0),
            Err(AppError::InvalidAmount(0))
        ));
    }

    #[test]
    fn pending_events_recorded_and_cleared() {
        let mut inv = seed_economy(5);
        inv.hold_seats(CabinClass::Economy, 1).unwrap();
        assert_eq!(inv.pending_events.len(), 1);
        let taken = inv.take_pending_events();
        assert_eq!(taken.len(), 1);
        assert!(inv.pending_events.is_empty());
    }
}
