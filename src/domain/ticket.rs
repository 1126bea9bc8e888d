use chrono::{DateTime, Utc};
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::booking::{Booking, BookingSegment, BookingStatus};
use crate::domain::flight_inventory::FlightId;
use crate::domain::pnr::PnrCode;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum CouponStatus {
    Open,
    Flown,
    Void,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Coupon {
    pub coupon_number: i32,
    pub flight_id: FlightId,
    pub seat_number: Option<String>,
    pub status: CouponStatus,
}

/// Separate aggregate referencing a Booking only via its PNR. Issued exactly
/// once per Confirmed booking.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Ticket {
    pub ticket_number: String,
    pub pnr: PnrCode,
    pub status: CouponStatus,
    pub passenger_id: uuid::Uuid,
    pub passenger_name: String,
    pub coupons: Vec<Coupon>,
    pub issued_at: DateTime<Utc>,
}

/// Generates a random 13-digit IATA-style ticket number. Collisions are not a
/// domain concern (no uniqueness invariant on ticket_number is specified) so a
/// single-shot RNG draw suffices, unlike the PNR which has a uniqueness index.
fn generate_ticket_number() -> String {
    let mut rng = rand::thread_rng();
    (0..13)
        .map(|_| std::char::from_digit(rng.gen_range(0..10), 10).unwrap())
        .collect()
}

impl Ticket {
    /// Builds one ticket per passenger on a Confirmed booking; coupons mirror segments.
    pub fn issue_for_booking(booking: &Booking, now: DateTime<Utc>) -> Result<Vec<Ticket>, AppError> {
        if booking.status != BookingStatus::Confirmed {
            return Err(AppError::InvalidBookingState {
                from: booking.status,
                attempted: "issueTicket",
            });
        }
        Ok(booking
            .passengers
            .iter()
            .map(|passenger| Ticket {
                ticket_number: generate_ticket_number(),
                pnr: booking.pnr.clone(),
                status: CouponStatus::Open,
                passenger_id: passenger.id,
                passenger_name: passenger.name.clone(),
                coupons: booking
                    .segments
                    .iter()
                    .enumerate()
                    .map(|(i, seg): (usize, &BookingSegment)| Coupon {
                        coupon_number: i as i32 + 1,
                        flight_id: seg.flight_id,
                        seat_number: seg.seat_number.clone(),
                        status: CouponStatus::Open,
                    })
                    .collect(),
                issued_at: now,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{BookingSegment, Gender, Passenger, PassengerType};
    use crate::domain::flight_inventory::CabinClass;
    use crate::domain::money::{Currency, Money};
    use uuid::Uuid;

    fn confirmed_booking() -> Booking {
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
        let mut b = Booking::new_held(PnrCode::generate(), passengers, segments, Utc::now());
        b.confirm("txn".into(), Utc::now()).unwrap();
        b
    }

    #[test]
    fn issues_one_ticket_per_passenger_with_mirrored_coupons() {
        let booking = confirmed_booking();
        let tickets = Ticket::issue_for_booking(&booking, Utc::now()).unwrap();
        assert_eq!(tickets.len(), booking.passengers.len());
        assert_eq!(tickets[0].coupons.len(), booking.segments.len());
        assert_eq!(tickets[0].ticket_number.len(), 13);
    }

    #[test]
    fn rejects_non_confirmed_booking() {
        let passengers = vec![Passenger {
            id: Uuid::new_v4(),
            name: "Jane Doe".into(),
            date_of_birth: chrono::NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            gender: Gender::Female,
            passenger_type: PassengerType::Adult,
        }];
        let held = Booking::new_held(PnrCode::generate(), passengers, vec![], Utc::now());
        assert!(Ticket::issue_for_booking(&held, Utc::now()).is_err());
    }
}
