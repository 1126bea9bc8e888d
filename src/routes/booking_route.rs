use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use uuid::Uuid;

use crate::domain::booking::BookingId;
use crate::error::AppError;
use crate::models::dto::{BookFlightRequest, BookingResponse, ConfirmBookingRequest};
use crate::saga::BookingSaga;
use crate::utils::jwt::AuthenticatedUser;

/// Saga entrypoint 1 of 2 (spec.md §4.3 `bookFlight`): hold a seat, create a
/// Held booking, start a payment checkout and poll it to completion.
#[openapi(tag = "Bookings")]
#[post("/bookings", format = "json", data = "<request>")]
pub async fn book_flight(
    request: Json<BookFlightRequest>,
    _auth: AuthenticatedUser,
    saga: &State<Arc<BookingSaga>>,
) -> Result<Json<BookingResponse>, AppError> {
    let outcome = saga.book_flight(request.into_inner().into_command()).await?;
    Ok(Json(BookingResponse::from_booking(
        &outcome.booking,
        outcome.checkout_url,
    )))
}

/// Saga entrypoint 2 of 2 (spec.md §4.3 `confirmBooking`): idempotent
/// re-entry for asynchronous payment completion (e.g. a webhook).
#[openapi(tag = "Bookings")]
#[post("/bookings/<booking_id>/confirm", format = "json", data = "<request>")]
pub async fn confirm_booking(
    booking_id: Uuid,
    request: Json<ConfirmBookingRequest>,
    _auth: AuthenticatedUser,
    saga: &State<Arc<BookingSaga>>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = saga
        .confirm_booking(BookingId(booking_id), request.into_inner().transaction_id)
        .await?;
    Ok(Json(BookingResponse::from_booking(&booking, None)))
}
