use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::booking::{Booking, BookingId, BookingSegment, Gender, Passenger, PassengerType};
use crate::domain::flight_inventory::{CabinClass, FlightId};
use crate::domain::money::{Currency, Money};
use crate::domain::outbox::OutboxEntry;
use crate::domain::pnr::PnrCode;
use crate::error::{AppError, AppResult};
use crate::ports::repositories::BookingRepository;

/// Postgres-backed implementation, grounded on the teacher's
/// `UPDATE ... version = version + 1 WHERE ... AND version = ?` OCC loop
/// (`services/ticket_service.rs::book_ticket_for_flight`) and on the
/// `booking_repo.rs` example's normalized passengers/segments child tables.
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        PgBookingRepository { pool }
    }

    async fn load_children(
        &self,
        booking_id: BookingId,
    ) -> AppResult<(Vec<Passenger>, Vec<BookingSegment>)> {
        let passenger_rows = sqlx::query(
            r#"
            SELECT id, name, date_of_birth, gender, passenger_type
            FROM passengers
            WHERE booking_id = $1
            "#,
        )
        .bind(booking_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        let passengers = passenger_rows
            .iter()
            .map(row_to_passenger)
            .collect::<AppResult<Vec<_>>>()?;

        let segment_rows = sqlx::query(
            r#"
            SELECT id, flight_id, cabin, price_amount, price_currency, seat_number
            FROM segments
            WHERE booking_id = $1
            "#,
        )
        .bind(booking_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        let segments = segment_rows
            .iter()
            .map(row_to_segment)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((passengers, segments))
    }

    async fn hydrate(&self, row: &sqlx::postgres::PgRow) -> AppResult<Booking> {
        let id: Uuid = row.try_get("id").map_err(AppError::from)?;
        let pnr_raw: String = row.try_get("pnr_code").map_err(AppError::from)?;
        let (passengers, segments) = self.load_children(BookingId(id)).await?;

        Ok(Booking {
            id: BookingId(id),
            pnr: PnrCode::parse(&pnr_raw).ok_or_else(|| {
                AppError::DataIntegrity(format!("stored PNR failed validation: {pnr_raw}"))
            })?,
            status: row.try_get("status").map_err(AppError::from)?,
            passengers,
            segments,
            version: row.try_get("version").map_err(AppError::from)?,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            expires_at: row.try_get("expires_at").map_err(AppError::from)?,
            pending_events: Vec::new(),
        })
    }
}

fn row_to_passenger(row: &sqlx::postgres::PgRow) -> AppResult<Passenger> {
    let gender_str: String = row.try_get("gender").map_err(AppError::from)?;
    let type_str: String = row.try_get("passenger_type").map_err(AppError::from)?;
    Ok(Passenger {
        id: row.try_get("id").map_err(AppError::from)?,
        name: row.try_get("name").map_err(AppError::from)?,
        date_of_birth: row.try_get("date_of_birth").map_err(AppError::from)?,
        gender: match gender_str.as_str() {
            "Male" => Gender::Male,
            "Female" => Gender::Female,
            _ => Gender::Other,
        },
        passenger_type: match type_str.as_str() {
            "Child" => PassengerType::Child,
            "Infant" => PassengerType::Infant,
            _ => PassengerType::Adult,
        },
    })
}

fn row_to_segment(row: &sqlx::postgres::PgRow) -> AppResult<BookingSegment> {
    let flight_id: Uuid = row.try_get("flight_id").map_err(AppError::from)?;
    let cabin: CabinClass = row.try_get("cabin").map_err(AppError::from)?;
    let price_amount: i64 = row.try_get("price_amount").map_err(AppError::from)?;
    let price_currency: Currency = row.try_get("price_currency").map_err(AppError::from)?;
    Ok(BookingSegment {
        id: row.try_get("id").map_err(AppError::from)?,
        flight_id: FlightId(flight_id),
        cabin,
        price: Money::new(price_amount, price_currency),
        seat_number: row.try_get("seat_number").map_err(AppError::from)?,
    })
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn find_by_pnr(&self, pnr: &PnrCode) -> AppResult<Option<Booking>> {
        let row = sqlx::query(
            "SELECT id, pnr_code, status, version, created_at, expires_at FROM bookings WHERE pnr_code = $1",
        )
        .bind(pnr.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        match row {
            Some(r) => Ok(Some(self.hydrate(&r).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: BookingId) -> AppResult<Option<Booking>> {
        let row = sqlx::query(
            "SELECT id, pnr_code, status, version, created_at, expires_at FROM bookings WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        match row {
            Some(r) => Ok(Some(self.hydrate(&r).await?)),
            None => Ok(None),
        }
    }

    async fn find_expired(&self, before: DateTime<Utc>, limit: i64) -> AppResult<Vec<Booking>> {
        let rows = sqlx::query(
            r#"
            SELECT id, pnr_code, status, version, created_at, expires_at
            FROM bookings
            WHERE status = 'Held' AND expires_at < $1
            ORDER BY expires_at ASC
            LIMIT $2
            "#,
        )
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in &rows {
            bookings.push(self.hydrate(row).await?);
        }
        Ok(bookings)
    }

    async fn find_by_passenger_id(&self, passenger_id: Uuid) -> AppResult<Vec<Booking>> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.pnr_code, b.status, b.version, b.created_at, b.expires_at
            FROM bookings b
            JOIN passengers p ON p.booking_id = b.id
            WHERE p.id = $1
            "#,
        )
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in &rows {
            bookings.push(self.hydrate(row).await?);
        }
        Ok(bookings)
    }

    async fn save(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        booking: &mut Booking,
    ) -> AppResult<()> {
        let expected_version = booking.version;

        let result = if expected_version == 0 {
            sqlx::query(
                r#"
                INSERT INTO bookings (id, pnr_code, status, version, created_at, expires_at, updated_at)
                VALUES ($1, $2, $3, 1, $4, $5, $4)
                "#,
            )
            .bind(booking.id.0)
            .bind(booking.pnr.as_str())
            .bind(booking.status)
            .bind(booking.created_at)
            .bind(booking.expires_at)
            .execute(&mut **tx)
            .await
            .map_err(AppError::from)?
        } else {
            sqlx::query(
                r#"
                UPDATE bookings
                SET status = $1, expires_at = $2, version = version + 1, updated_at = $3
                WHERE id = $4 AND version = $5
                "#,
            )
            .bind(booking.status)
            .bind(booking.expires_at)
            .bind(Utc::now())
            .bind(booking.id.0)
            .bind(expected_version)
            .execute(&mut **tx)
            .await
            .map_err(AppError::from)?
        };

        if result.rows_affected() == 0 {
            let actual = sqlx::query_scalar::<_, i64>("SELECT version FROM bookings WHERE id = $1")
                .bind(booking.id.0)
                .fetch_optional(&mut **tx)
                .await
                .map_err(AppError::from)?
                .ok_or(AppError::BookingNotFound)?;

            return Err(AppError::OptimisticLockConflict {
                expected: expected_version,
                actual,
            });
        }

        sqlx::query("DELETE FROM passengers WHERE booking_id = $1")
            .bind(booking.id.0)
            .execute(&mut **tx)
            .await
            .map_err(AppError::from)?;
        sqlx::query("DELETE FROM segments WHERE booking_id = $1")
            .bind(booking.id.0)
            .execute(&mut **tx)
            .await
            .map_err(AppError::from)?;

        for passenger in &booking.passengers {
            let gender_str = match passenger.gender {
                Gender::Male => "Male",
                Gender::Female => "Female",
                Gender::Other => "Other",
            };
            let type_str = match passenger.passenger_type {
                PassengerType::Adult => "Adult",
                PassengerType::Child => "Child",
                PassengerType::Infant => "Infant",
            };
            sqlx::query(
                r#"
                INSERT INTO passengers (id, booking_id, name, date_of_birth, gender, passenger_type)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(passenger.id)
            .bind(booking.id.0)
            .bind(&passenger.name)
            .bind(passenger.date_of_birth)
            .bind(gender_str)
            .bind(type_str)
            .execute(&mut **tx)
            .await
            .map_err(AppError::from)?;
        }

        for segment in &booking.segments {
            sqlx::query(
                r#"
                INSERT INTO segments (id, booking_id, flight_id, cabin, price_amount, price_currency, seat_number)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(segment.id)
            .bind(booking.id.0)
            .bind(segment.flight_id.0)
            .bind(segment.cabin)
            .bind(segment.price.amount)
            .bind(segment.price.currency)
            .bind(&segment.seat_number)
            .execute(&mut **tx)
            .await
            .map_err(AppError::from)?;
        }

        let events = booking.take_pending_events();
        if !events.is_empty() {
            let now = Utc::now();
            let entries: Vec<OutboxEntry> =
                events.iter().map(|e| OutboxEntry::from_event(e, now)).collect();
            super::outbox_repo::insert_entries(tx, &entries).await?;
        }

        booking.version = expected_version + 1;
        Ok(())
    }
}
