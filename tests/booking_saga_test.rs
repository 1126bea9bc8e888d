use std::sync::Arc;
use std::time::Duration;

use airline_booking_system::domain::booking::{BookingStatus, Gender, Passenger, PassengerType};
use airline_booking_system::domain::flight_inventory::{CabinClass, FlightId};
use airline_booking_system::inventory::InventoryEngine;
use airline_booking_system::persistence::repositories::booking_repo::PgBookingRepository;
use airline_booking_system::persistence::repositories::flight_inventory_repo::PgFlightInventoryRepository;
use airline_booking_system::persistence::repositories::ticket_repo::PgTicketRepository;
use airline_booking_system::persistence::unit_of_work::UnitOfWork;
use airline_booking_system::ports::notification::{MockNotificationGateway, NotificationGateway};
use airline_booking_system::ports::payment::{MockPaymentGateway, PaymentGateway};
use airline_booking_system::ports::repositories::{BookingRepository, FlightInventoryRepository, TicketRepository};
use airline_booking_system::saga::{BookFlightCommand, BookingSaga, SagaConfig};
use async_trait::async_trait;
use ctor::dtor;
use sqlx::PgPool as Pool;
use test_context::{test_context, AsyncTestContext};
use uuid::Uuid;

mod common {
    pub mod test_utils;
}
use common::test_utils::TestDb;

struct SagaContext {
    pool: Pool,
}

#[dtor]
fn cleanup() {
    if let Err(e) = TestDb::cleanup_database_sync() {
        eprintln!("Failed to cleanup test database: {e}");
    }
}

#[async_trait]
impl AsyncTestContext for SagaContext {
    async fn setup() -> Self {
        let pool = TestDb::get_instance(file!())
            .await
            .expect("Failed to get test database instance");
        SagaContext { pool }
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

fn build_saga(
    pool: &Pool,
) -> (Arc<BookingSaga>, Arc<InventoryEngine>, Arc<dyn BookingRepository>) {
    let uow = UnitOfWork::new(pool.clone());
    let flight_repo: Arc<dyn FlightInventoryRepository> =
        Arc::new(PgFlightInventoryRepository::new(pool.clone()));
    let booking_repo: Arc<dyn BookingRepository> = Arc::new(PgBookingRepository::new(pool.clone()));
    let ticket_repo: Arc<dyn TicketRepository> = Arc::new(PgTicketRepository::new(pool.clone()));
    let inventory = InventoryEngine::new(flight_repo, uow.clone(), 500, Duration::from_secs(30 * 60));

    let payment: Arc<dyn PaymentGateway> = Arc::new(MockPaymentGateway::default());
    let notification: Arc<dyn NotificationGateway> = Arc::new(MockNotificationGateway::default());

    let saga = Arc::new(BookingSaga::new(
        inventory.clone(),
        booking_repo.clone(),
        ticket_repo,
        payment,
        notification,
        uow,
        SagaConfig::default(),
    ));
    (saga, inventory, booking_repo)
}

fn passenger() -> Passenger {
    Passenger {
        id: Uuid::new_v4(),
        name: "Ada Lovelace".to_string(),
        date_of_birth: chrono::NaiveDate::from_ymd_opt(1992, 4, 12).unwrap(),
        gender: Gender::Female,
        passenger_type: PassengerType::Adult,
    }
}

fn book_command(flight_id: FlightId) -> BookFlightCommand {
    BookFlightCommand {
        flight_id,
        cabin: CabinClass::Economy,
        passengers: vec![passenger()],
        seat_number: Some("14C".to_string()),
        customer_email: "ada@example.test".to_string(),
        customer_external_id: None,
        success_url: "https://example.test/success".to_string(),
        cancel_url: None,
    }
}

/// Happy path (spec.md §4.3 steps 1-8): hold succeeds, checkout completes via
/// the mock gateway, booking ends Confirmed with a seat permanently consumed.
#[test_context(SagaContext)]
#[tokio::test]
async fn book_flight_confirms_and_consumes_seat(ctx: &SagaContext) {
    let flight_id = seed_flight(&ctx.pool, 5).await;
    let (saga, inventory, _booking_repo) = build_saga(&ctx.pool);

    let outcome = saga
        .book_flight(book_command(flight_id))
        .await
        .expect("booking should succeed");

    assert_eq!(outcome.booking.status, BookingStatus::Confirmed);
    assert!(outcome.checkout_url.is_some());

    let snapshot = inventory.get_availability(flight_id).await.unwrap();
    assert_eq!(snapshot.availability[&CabinClass::Economy].available, 4);
}

/// A hold that fails (no seats) must never reach the payment step and must
/// not leave a booking row behind (spec.md §4.3 step 1 failure path).
#[test_context(SagaContext)]
#[tokio::test]
async fn book_flight_fails_fast_when_flight_is_full(ctx: &SagaContext) {
    let flight_id = seed_flight(&ctx.pool, 0).await;
    let (saga, _inventory, booking_repo) = build_saga(&ctx.pool);

    let result = saga.book_flight(book_command(flight_id)).await;
    assert!(result.is_err());

    let bookings = booking_repo
        .find_by_passenger_id(Uuid::nil())
        .await
        .unwrap();
    assert!(bookings.is_empty());
}

/// A second booking attempt against a flight with exactly one seat left must
/// be rejected by the inventory engine rather than oversold, and the first
/// booking's successful hold must not be disturbed by the second's failure
/// (spec.md §9 no-oversell invariant, exercised through the saga entrypoint).
#[test_context(SagaContext)]
#[tokio::test]
async fn second_booking_rejected_once_seat_exhausted(ctx: &SagaContext) {
    let flight_id = seed_flight(&ctx.pool, 1).await;
    let (saga, inventory, _booking_repo) = build_saga(&ctx.pool);

    let first = saga.book_flight(book_command(flight_id)).await;
    assert!(first.is_ok());
    assert_eq!(first.unwrap().booking.status, BookingStatus::Confirmed);

    let second = saga.book_flight(book_command(flight_id)).await;
    assert!(second.is_err());

    let snapshot = inventory.get_availability(flight_id).await.unwrap();
    assert_eq!(snapshot.availability[&CabinClass::Economy].available, 0);
}

/// `confirmBooking` re-entry is idempotent: calling it again on an
/// already-Confirmed booking returns the same booking without error
/// (spec.md §4.3 "Operation: confirmBooking").
#[test_context(SagaContext)]
#[tokio::test]
async fn confirm_booking_is_idempotent(ctx: &SagaContext) {
    let flight_id = seed_flight(&ctx.pool, 3).await;
    let (saga, _inventory, _booking_repo) = build_saga(&ctx.pool);

    let outcome = saga.book_flight(book_command(flight_id)).await.unwrap();
    let booking_id = outcome.booking.id;

    let reconfirmed = saga
        .confirm_booking(booking_id, "txn-already-applied".to_string())
        .await
        .expect("re-confirming an already-Confirmed booking should succeed idempotently");

    assert_eq!(reconfirmed.status, BookingStatus::Confirmed);
    assert_eq!(reconfirmed.id, booking_id);
}
