use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::domain::pnr::PnrCode;
use crate::domain::ticket::Ticket;
use crate::error::AppError;
use crate::ports::repositories::TicketRepository;
use crate::utils::jwt::AuthenticatedUser;

/// Read-side lookup for tickets issued against a PNR (spec.md §3 Ticket,
/// §4.3 step 7 "Issue Ticket"). Issuance itself only happens inside the
/// booking saga — there is no write endpoint here.
#[openapi(tag = "Tickets")]
#[get("/tickets/<pnr>")]
pub async fn get_tickets_by_pnr(
    pnr: String,
    _auth: AuthenticatedUser,
    ticket_repo: &State<Arc<dyn TicketRepository>>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let pnr = PnrCode::parse(&pnr).ok_or_else(|| AppError::BadRequest("invalid PNR".to_string()))?;
    let tickets = ticket_repo.find_by_pnr(&pnr).await?;
    Ok(Json(tickets))
}
