//! Request/response DTOs for the thin HTTP shell (SPEC_FULL.md §10.1). These
//! are wire types only — they never leak into the domain/saga/engine layer,
//! which works exclusively in terms of `BookFlightCommand`/`Booking`/etc.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::booking::{Booking, BookingStatus, Gender, PassengerType};
use crate::domain::flight_inventory::CabinClass;
use crate::domain::money::Currency;
use crate::saga::BookFlightCommand;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PassengerRequest {
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub passenger_type: PassengerType,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BookFlightRequest {
    pub flight_id: Uuid,
    pub cabin: CabinClass,
    pub passengers: Vec<PassengerRequest>,
    pub seat_number: Option<String>,
    pub customer_email: String,
    pub customer_external_id: Option<String>,
    pub success_url: String,
    pub cancel_url: Option<String>,
}

impl BookFlightRequest {
    pub fn into_command(self) -> BookFlightCommand {
        let passengers = self
            .passengers
            .into_iter()
            .map(|p| crate::domain::booking::Passenger {
                id: Uuid::new_v4(),
                name: p.name,
                date_of_birth: p.date_of_birth,
                gender: p.gender,
                passenger_type: p.passenger_type,
            })
            .collect();

        BookFlightCommand {
            flight_id: crate::domain::flight_inventory::FlightId(self.flight_id),
            cabin: self.cabin,
            passengers,
            seat_number: self.seat_number,
            customer_email: self.customer_email,
            customer_external_id: self.customer_external_id,
            success_url: self.success_url,
            cancel_url: self.cancel_url,
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct BookingResponse {
    pub booking_id: Uuid,
    pub pnr: String,
    pub status: BookingStatus,
    pub checkout_url: Option<String>,
}

impl BookingResponse {
    pub fn from_booking(booking: &Booking, checkout_url: Option<String>) -> Self {
        BookingResponse {
            booking_id: booking.id.0,
            pnr: booking.pnr.as_str().to_string(),
            status: booking.status,
            checkout_url,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConfirmBookingRequest {
    pub transaction_id: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct CabinAvailabilityResponse {
    pub cabin: CabinClass,
    pub available: u32,
    pub capacity: u32,
    pub price_amount: i64,
    pub price_currency: Currency,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct FlightAvailabilityResponse {
    pub flight_id: Uuid,
    pub version: i64,
    pub cabins: Vec<CabinAvailabilityResponse>,
}

impl FlightAvailabilityResponse {
    pub fn from_inventory(inventory: &crate::domain::flight_inventory::FlightInventory) -> Self {
        let mut cabins: Vec<CabinAvailabilityResponse> = inventory
            .availability
            .iter()
            .map(|(cabin, bucket)| CabinAvailabilityResponse {
                cabin: *cabin,
                available: bucket.available,
                capacity: bucket.capacity,
                price_amount: bucket.price.amount,
                price_currency: bucket.price.currency,
            })
            .collect();
        cabins.sort_by_key(|c| c.cabin.to_string());

        FlightAvailabilityResponse {
            flight_id: inventory.flight_id.0,
            version: inventory.version,
            cabins,
        }
    }
}
