use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;

use crate::domain::flight_inventory::{CabinClass, FlightId, FlightInventory, SeatBucket};
use crate::domain::money::{Currency, Money};
use crate::domain::outbox::OutboxEntry;
use crate::error::{AppError, AppResult};
use crate::ports::repositories::FlightInventoryRepository;

/// Postgres-backed implementation. The `flight_inventory` table is one wide
/// row per flight with per-cabin columns (§6's illustrative layout) rather
/// than child rows, since the cabin set is fixed (Economy/Business/First) —
/// there is nothing to full-replace, unlike bookings' passengers/segments.
pub struct PgFlightInventoryRepository {
    pool: PgPool,
}

impl PgFlightInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        PgFlightInventoryRepository { pool }
    }

    fn cabin_column_prefix(cabin: CabinClass) -> &'static str {
        match cabin {
            CabinClass::Economy => "economy",
            CabinClass::Business => "business",
            CabinClass::First => "first",
        }
    }

    fn row_to_inventory(row: &sqlx::postgres::PgRow) -> AppResult<FlightInventory> {
        let flight_id: uuid::Uuid = row.try_get("flight_id").map_err(AppError::from)?;
        let version: i64 = row.try_get("version").map_err(AppError::from)?;
        let last_updated = row.try_get("last_updated").map_err(AppError::from)?;

        let mut availability = HashMap::new();
        for cabin in [CabinClass::Economy, CabinClass::Business, CabinClass::First] {
            let prefix = Self::cabin_column_prefix(cabin);
            let capacity: i32 = row
                .try_get(format!("{prefix}_capacity").as_str())
                .map_err(AppError::from)?;
            let available: i32 = row
                .try_get(format!("{prefix}_available").as_str())
                .map_err(AppError::from)?;
            let price_amount: i64 = row
                .try_get(format!("{prefix}_price_amount").as_str())
                .map_err(AppError::from)?;
            let price_currency: Currency = row
                .try_get(format!("{prefix}_price_currency").as_str())
                .map_err(AppError::from)?;
            availability.insert(
                cabin,
                SeatBucket {
                    available: available as u32,
                    capacity: capacity as u32,
                    price: Money::new(price_amount, price_currency),
                },
            );
        }

        Ok(FlightInventory {
            flight_id: FlightId(flight_id),
            availability,
            version,
            pending_events: Vec::new(),
            last_updated,
        })
    }
}

#[async_trait]
impl FlightInventoryRepository for PgFlightInventoryRepository {
    async fn get_by_flight_id(&self, flight_id: FlightId) -> AppResult<Option<FlightInventory>> {
        let row = sqlx::query(
            r#"
            SELECT flight_id, version, last_updated,
                   economy_capacity, economy_available, economy_price_amount, economy_price_currency,
                   business_capacity, business_available, business_price_amount, business_price_currency,
                   first_capacity, first_available, first_price_amount, first_price_currency
            FROM flight_inventory
            WHERE flight_id = $1
            "#,
        )
        .bind(flight_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        row.as_ref().map(Self::row_to_inventory).transpose()
    }

    async fn save(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        inventory: &mut FlightInventory,
    ) -> AppResult<()> {
        let expected_version = inventory.version;
        let economy = inventory.availability[&CabinClass::Economy];
        let business = inventory.availability[&CabinClass::Business];
        let first = inventory.availability[&CabinClass::First];

        let result = sqlx::query(
            r#"
            UPDATE flight_inventory
            SET economy_available = $1, economy_capacity = $2,
                economy_price_amount = $3, economy_price_currency = $4,
                business_available = $5, business_capacity = $6,
                business_price_amount = $7, business_price_currency = $8,
                first_available = $9, first_capacity = $10,
                first_price_amount = $11, first_price_currency = $12,
                version = version + 1,
                last_updated = $13
            WHERE flight_id = $14 AND version = $15
            "#,
        )
        .bind(economy.available as i32)
        .bind(economy.capacity as i32)
        .bind(economy.price.amount)
        .bind(economy.price.currency)
        .bind(business.available as i32)
        .bind(business.capacity as i32)
        .bind(business.price.amount)
        .bind(business.price.currency)
        .bind(first.available as i32)
        .bind(first.capacity as i32)
        .bind(first.price.amount)
        .bind(first.price.currency)
        .bind(Utc::now())
        .bind(inventory.flight_id.0)
        .bind(expected_version)
        .execute(&mut **tx)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            let actual = sqlx::query_scalar::<_, i64>(
                "SELECT version FROM flight_inventory WHERE flight_id = $1",
            )
            .bind(inventory.flight_id.0)
            .fetch_optional(&mut **tx)
            .await
            .map_err(AppError::from)?
            .ok_or(AppError::FlightNotFound)?;

            return Err(AppError::OptimisticLockConflict {
                expected: expected_version,
                actual,
            });
        }

        let events = inventory.take_pending_events();
        if !events.is_empty() {
            let now = Utc::now();
            let entries: Vec<OutboxEntry> =
                events.iter().map(|e| OutboxEntry::from_event(e, now)).collect();
            super::outbox_repo::insert_entries(tx, &entries).await?;
        }

        inventory.version = expected_version + 1;
        Ok(())
    }

    async fn find_available_flights(
        &self,
        cabin: CabinClass,
        min_seats: u32,
    ) -> AppResult<Vec<FlightInventory>> {
        let prefix = Self::cabin_column_prefix(cabin);
        let sql = format!(
            r#"
            SELECT flight_id, version, last_updated,
                   economy_capacity, economy_available, economy_price_amount, economy_price_currency,
                   business_capacity, business_available, business_price_amount, business_price_currency,
                   first_capacity, first_available, first_price_amount, first_price_currency
            FROM flight_inventory
            WHERE {prefix}_available >= $1
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(min_seats as i32)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;

        rows.iter().map(Self::row_to_inventory).collect()
    }
}
