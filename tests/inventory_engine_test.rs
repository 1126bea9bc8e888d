use std::sync::Arc;
use std::time::Duration;

use airline_booking_system::domain::flight_inventory::{CabinClass, FlightId};
use airline_booking_system::domain::money::{Currency, Money};
use airline_booking_system::inventory::InventoryEngine;
use airline_booking_system::persistence::repositories::flight_inventory_repo::PgFlightInventoryRepository;
use airline_booking_system::persistence::unit_of_work::UnitOfWork;
use airline_booking_system::ports::repositories::FlightInventoryRepository;
use async_trait::async_trait;
use ctor::dtor;
use sqlx::PgPool as Pool;
use test_context::{test_context, AsyncTestContext};
use uuid::Uuid;

mod common {
    pub mod test_utils;
}
use common::test_utils::TestDb;

struct InventoryContext {
    pool: Pool,
}

#[dtor]
fn cleanup() {
    if let Err(e) = TestDb::cleanup_database_sync() {
        eprintln!("Failed to cleanup test database: {e}");
    }
}

#[async_trait]
impl AsyncTestContext for InventoryContext {
    async fn setup() -> Self {
        let pool = TestDb::get_instance(file!())
            .await
            .expect("Failed to get test database instance");
        InventoryContext { pool }
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
        ) VALUES ($1, 0, now(), $2, $2, 10000, 'EUR', 10, 10, 30000, 'EUR', 4, 4, 60000, 'EUR')
        "#,
    )
    .bind(flight_id)
    .bind(economy_capacity)
    .execute(pool)
    .await
    .expect("failed to seed flight_inventory row");
    FlightId(flight_id)
}

#[test_context(InventoryContext)]
#[tokio::test]
async fn hold_then_release_round_trips_available_seats(ctx: &InventoryContext) {
    let flight_id = seed_flight(&ctx.pool, 10).await;
    let repo: Arc<dyn FlightInventoryRepository> =
        Arc::new(PgFlightInventoryRepository::new(ctx.pool.clone()));
    let uow = UnitOfWork::new(ctx.pool.clone());
    let engine = InventoryEngine::new(repo, uow, 500, Duration::from_secs(30 * 60));

    let hold = engine
        .hold_seats(flight_id, CabinClass::Economy, 3)
        .await
        .expect("hold should succeed");
    assert_eq!(hold.unit_price, Money::new(10000, Currency::EUR));
    assert_eq!(
        hold.inventory_snapshot.availability[&CabinClass::Economy].available,
        7
    );

    engine
        .release_seats(flight_id, CabinClass::Economy, 3)
        .await
        .expect("release should succeed");

    let snapshot = engine.get_availability(flight_id).await.unwrap();
    assert_eq!(snapshot.availability[&CabinClass::Economy].available, 10);
}

#[test_context(InventoryContext)]
#[tokio::test]
async fn hold_beyond_capacity_is_rejected(ctx: &InventoryContext) {
    let flight_id = seed_flight(&ctx.pool, 2).await;
    let repo: Arc<dyn FlightInventoryRepository> =
        Arc::new(PgFlightInventoryRepository::new(ctx.pool.clone()));
    let uow = UnitOfWork::new(ctx.pool.clone());
    let engine = InventoryEngine::new(repo, uow, 500, Duration::from_secs(30 * 60));

    let result = engine.hold_seats(flight_id, CabinClass::Economy, 3).await;
    assert!(result.is_err());

    let snapshot = engine.get_availability(flight_id).await.unwrap();
    assert_eq!(snapshot.availability[&CabinClass::Economy].available, 2);
}

/// Concurrent callers holding against the same flight/cabin must never drive
/// `available` negative or above `capacity` — this is the coalescing queue's
/// and OCC retry's core property (spec.md §4.1, §9 invariant).
#[tokio::test]
async fn concurrent_holds_never_oversell() {
    let pool = TestDb::get_instance(file!())
        .await
        .expect("failed to get test database instance");

    let flight_id = seed_flight(&pool, 20).await;
    let repo: Arc<dyn FlightInventoryRepository> =
        Arc::new(PgFlightInventoryRepository::new(pool.clone()));
    let uow = UnitOfWork::new(pool.clone());
    let engine = InventoryEngine::new(repo, uow, 500, Duration::from_secs(30 * 60));

    let mut set = tokio::task::JoinSet::new();
    for _ in 0..30 {
        let engine = engine.clone();
        set.spawn(async move { engine.hold_seats(flight_id, CabinClass::Economy, 1).await });
    }

    let mut succeeded = 0usize;
    while let Some(result) = set.join_next().await {
        if result.expect("task panicked").is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 20, "exactly capacity holds should succeed, no oversell");
    let snapshot = engine.get_availability(flight_id).await.unwrap();
    assert_eq!(snapshot.availability[&CabinClass::Economy].available, 0);
}
