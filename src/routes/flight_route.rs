use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use uuid::Uuid;

use crate::domain::flight_inventory::{CabinClass, FlightId};
use crate::error::AppError;
use crate::inventory::InventoryEngine;
use crate::models::dto::FlightAvailabilityResponse;
use crate::ports::repositories::FlightInventoryRepository;
use crate::utils::jwt::AuthenticatedUser;

/// `GetAvailability` (spec.md §4.1): current per-cabin seat buckets for one flight.
#[openapi(tag = "Flights")]
#[get("/flights/<flight_id>/availability")]
pub async fn get_availability(
    flight_id: Uuid,
    _auth: AuthenticatedUser,
    inventory: &State<Arc<InventoryEngine>>,
) -> Result<Json<FlightAvailabilityResponse>, AppError> {
    let snapshot = inventory.get_availability(FlightId(flight_id)).await?;
    Ok(Json(FlightAvailabilityResponse::from_inventory(&snapshot)))
}

fn parse_cabin(raw: &str) -> Result<CabinClass, AppError> {
    match raw.to_lowercase().as_str() {
        "economy" => Ok(CabinClass::Economy),
        "business" => Ok(CabinClass::Business),
        "first" => Ok(CabinClass::First),
        other => Err(AppError::BadRequest(format!("unknown cabin class: {other}"))),
    }
}

/// Port: Inventory Repository `findAvailableFlights` (spec.md §6), exposed
/// read-only for callers shopping by cabin and minimum seat count.
#[openapi(tag = "Flights")]
#[get("/flights/search?<cabin>&<min_seats>")]
pub async fn search_flights(
    cabin: String,
    min_seats: u32,
    _auth: AuthenticatedUser,
    flight_repo: &State<Arc<dyn FlightInventoryRepository>>,
) -> Result<Json<Vec<FlightAvailabilityResponse>>, AppError> {
    let cabin = parse_cabin(&cabin)?;
    let inventories = flight_repo.find_available_flights(cabin, min_seats).await?;
    Ok(Json(
        inventories
            .iter()
            .map(FlightAvailabilityResponse::from_inventory)
            .collect(),
    ))
}
