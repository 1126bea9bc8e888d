use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::domain::events::DomainEvent;
use crate::domain::flight_inventory::FlightId;
use crate::domain::outbox::OutboxEntry;
use crate::domain::pnr::PnrCode;
use crate::domain::ticket::{Coupon, CouponStatus, Ticket};
use crate::error::{AppError, AppResult};
use crate::ports::repositories::TicketRepository;

pub struct PgTicketRepository {
    pool: PgPool,
}

impl PgTicketRepository {
    pub fn new(pool: PgPool) -> Self {
        PgTicketRepository { pool }
    }
}

#[async_trait]
impl TicketRepository for PgTicketRepository {
    async fn save(&self, tx: &mut Transaction<'_, Postgres>, ticket: &Ticket) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tickets (ticket_number, pnr, status, passenger_id, passenger_name, issued_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&ticket.ticket_number)
        .bind(ticket.pnr.as_str())
        .bind(ticket.status)
        .bind(ticket.passenger_id)
        .bind(&ticket.passenger_name)
        .bind(ticket.issued_at)
        .execute(&mut **tx)
        .await
        .map_err(AppError::from)?;

        for coupon in &ticket.coupons {
            sqlx::query(
                r#"
                INSERT INTO coupons (ticket_number, coupon_number, flight_id, seat_number, status)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&ticket.ticket_number)
            .bind(coupon.coupon_number)
            .bind(coupon.flight_id.0)
            .bind(&coupon.seat_number)
            .bind(coupon.status)
            .execute(&mut **tx)
            .await
            .map_err(AppError::from)?;
        }

        let now = Utc::now();
        let event = DomainEvent::TicketIssued {
            ticket_number: ticket.ticket_number.clone(),
            pnr: ticket.pnr.clone(),
            occurred_at: now,
        };
        super::outbox_repo::insert_entries(tx, &[OutboxEntry::from_event(&event, now)]).await?;

        Ok(())
    }

    async fn find_by_pnr(&self, pnr: &PnrCode) -> AppResult<Vec<Ticket>> {
        let ticket_rows = sqlx::query(
            "SELECT ticket_number, pnr, status, passenger_id, passenger_name, issued_at FROM tickets WHERE pnr = $1",
        )
        .bind(pnr.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        let mut tickets = Vec::with_capacity(ticket_rows.len());
        for row in &ticket_rows {
            let ticket_number: String = row.try_get("ticket_number").map_err(AppError::from)?;
            let coupon_rows = sqlx::query(
                "SELECT coupon_number, flight_id, seat_number, status FROM coupons WHERE ticket_number = $1 ORDER BY coupon_number",
            )
            .bind(&ticket_number)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;

            let coupons = coupon_rows
                .iter()
                .map(|c| {
                    Ok::<_, AppError>(Coupon {
                        coupon_number: c.try_get("coupon_number").map_err(AppError::from)?,
                        flight_id: FlightId(c.try_get("flight_id").map_err(AppError::from)?),
                        seat_number: c.try_get("seat_number").map_err(AppError::from)?,
                        status: c.try_get::<CouponStatus, _>("status").map_err(AppError::from)?,
                    })
                })
                .collect::<AppResult<Vec<_>>>()?;

            tickets.push(Ticket {
                ticket_number,
                pnr: pnr.clone(),
                status: row.try_get("status").map_err(AppError::from)?,
                passenger_id: row.try_get("passenger_id").map_err(AppError::from)?,
                passenger_name: row.try_get("passenger_name").map_err(AppError::from)?,
                coupons,
                issued_at: row.try_get("issued_at").map_err(AppError::from)?,
            });
        }
        Ok(tickets)
    }
}
