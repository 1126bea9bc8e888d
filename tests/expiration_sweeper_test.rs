use std::sync::Arc;
use std::time::Duration;

use airline_booking_system::domain::booking::{
    Booking, BookingSegment, Gender, Passenger, PassengerType,
};
use airline_booking_system::domain::flight_inventory::{CabinClass, FlightId};
use airline_booking_system::domain::money::{Currency, Money};
use airline_booking_system::domain::pnr::PnrCode;
use airline_booking_system::inventory::InventoryEngine;
use airline_booking_system::persistence::repositories::booking_repo::PgBookingRepository;
use airline_booking_system::persistence::repositories::flight_inventory_repo::PgFlightInventoryRepository;
use airline_booking_system::persistence::unit_of_work::UnitOfWork;
use airline_booking_system::ports::repositories::{BookingRepository, FlightInventoryRepository};
use airline_booking_system::sweeper::ExpirationSweeper;
use async_trait::async_trait;
use chrono::Utc;
use ctor::dtor;
use sqlx::PgPool as Pool;
use test_context::{test_context, AsyncTestContext};
use uuid::Uuid;

mod common {
    pub mod test_utils;
}
use common::test_utils::TestDb;

struct SweeperContext {
    pool: Pool,
}

#[dtor]
fn cleanup() {
    if let Err(e) = TestDb::cleanup_database_sync() {
        eprintln!("Failed to cleanup test database: {e}");
    }
}

#[async_trait]
impl AsyncTestContext for SweeperContext {
    async fn setup() -> Self {
        let pool = TestDb::get_instance(file!())
            .await
            .expect("Failed to get test database instance");
        SweeperContext { pool }
    }

    async fn teardown(self) {
        let _ = sqlx::query("SELECT 1").execute(&self.pool).await;
    }
}

async fn seed_flight(pool: &Pool, economy_capacity: i32) -> FlightId {
    let flight_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO flight_inventory (
            flight_id, version, last_updated,
            economy_capacity, economy_available, economy_price_amount, economy_price_currency,
            business_capacity, business_available, business_price_amount, business_price_currency,
            first_capacity, first_available, first_price_amount, first_price_currency
        ) VALUES ($1, 0, now(), $2, 0, 10000, 'EUR', 10, 10, 30000, 'EUR', 4, 4, 60000, 'EUR')
        "#,
    )
    .bind(flight_id)
    .bind(economy_capacity)
    .execute(pool)
    .await
    .expect("failed to seed flight_inventory row");
    FlightId(flight_id)
}

fn held_booking(flight_id: FlightId, expires_at: chrono::DateTime<Utc>) -> Booking {
    let passengers = vec![Passenger {
        id: Uuid::new_v4(),
        name: "Expired Passenger".to_string(),
        date_of_birth: chrono::NaiveDate::from_ymd_opt(1985, 6, 1).unwrap(),
        gender: Gender::Other,
        passenger_type: PassengerType::Adult,
    }];
    let segments = vec![BookingSegment {
        id: Uuid::new_v4(),
        flight_id,
        cabin: CabinClass::Economy,
        price: Money::new(10000, Currency::EUR),
        seat_number: None,
    }];
    let mut booking = Booking::new_held(PnrCode::generate(), passengers, segments, Utc::now());
    booking.expires_at = Some(expires_at);
    booking
}

/// A Held booking whose hold window lapsed must have its seat reclaimed and
/// its status flipped to Expired on the next sweep tick (spec.md §4.4).
#[test_context(SweeperContext)]
#[tokio::test]
async fn reclaims_expired_held_booking(ctx: &SweeperContext) {
    // Economy was fully sold out (0 available) by the held booking below;
    // the sweep should return that seat to the pool.
    let flight_id = seed_flight(&ctx.pool, 1).await;
    let uow = UnitOfWork::new(ctx.pool.clone());
    let booking_repo: Arc<dyn BookingRepository> =
        Arc::new(PgBookingRepository::new(ctx.pool.clone()));
    let flight_repo: Arc<dyn FlightInventoryRepository> =
        Arc::new(PgFlightInventoryRepository::new(ctx.pool.clone()));
    let inventory = InventoryEngine::new(flight_repo, uow.clone(), 500, Duration::from_secs(30 * 60));

    let mut booking = held_booking(flight_id, Utc::now() - chrono::Duration::minutes(5));
    uow.run(|tx| booking_repo.save(tx, &mut booking)).await.unwrap();

    let sweeper = Arc::new(ExpirationSweeper::new(
        booking_repo.clone(),
        inventory.clone(),
        uow,
        Duration::from_secs(60),
        100,
    ));
    sweeper.run_once().await;

    let reloaded = booking_repo.find_by_id(booking.id).await.unwrap().unwrap();
    assert_eq!(
        reloaded.status,
        airline_booking_system::domain::booking::BookingStatus::Expired
    );

    let snapshot = inventory.get_availability(flight_id).await.unwrap();
    assert_eq!(snapshot.availability[&CabinClass::Economy].available, 1);
}

/// A Held booking still inside its window must survive a sweep untouched.
#[test_context(SweeperContext)]
#[tokio::test]
async fn leaves_unexpired_held_booking_alone(ctx: &SweeperContext) {
    let flight_id = seed_flight(&ctx.pool, 1).await;
    let uow = UnitOfWork::new(ctx.pool.clone());
    let booking_repo: Arc<dyn BookingRepository> =
        Arc::new(PgBookingRepository::new(ctx.pool.clone()));
    let flight_repo: Arc<dyn FlightInventoryRepository> =
        Arc::new(PgFlightInventoryRepository::new(ctx.pool.clone()));
    let inventory = InventoryEngine::new(flight_repo, uow.clone(), 500, Duration::from_secs(30 * 60));

    let mut booking = held_booking(flight_id, Utc::now() + chrono::Duration::minutes(25));
    uow.run(|tx| booking_repo.save(tx, &mut booking)).await.unwrap();

    let sweeper = Arc::new(ExpirationSweeper::new(
        booking_repo.clone(),
        inventory,
        uow,
        Duration::from_secs(60),
        100,
    ));
    sweeper.run_once().await;

    let reloaded = booking_repo.find_by_id(booking.id).await.unwrap().unwrap();
    assert_eq!(
        reloaded.status,
        airline_booking_system::domain::booking::BookingStatus::Held
    );
}
