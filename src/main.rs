#[macro_use]
extern crate rocket;

use std::collections::HashMap;
use std::sync::Arc;

use rocket::fairing::AdHoc;
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::make_swagger_ui;

use airline_booking_system::config::Config;
use airline_booking_system::db::Database;
use airline_booking_system::inventory::InventoryEngine;
use airline_booking_system::metrics::register_core_metrics;
use airline_booking_system::persistence::repositories::booking_repo::PgBookingRepository;
use airline_booking_system::persistence::repositories::flight_inventory_repo::PgFlightInventoryRepository;
use airline_booking_system::persistence::repositories::outbox_repo::PgOutboxRepository;
use airline_booking_system::persistence::repositories::ticket_repo::PgTicketRepository;
use airline_booking_system::persistence::unit_of_work::UnitOfWork;
use airline_booking_system::ports::notification::{MockNotificationGateway, NotificationGateway};
use airline_booking_system::ports::payment::{MockPaymentGateway, PaymentGateway};
use airline_booking_system::ports::repositories::{
    BookingRepository, FlightInventoryRepository, OutboxRepository, TicketRepository,
};
use airline_booking_system::publisher::OutboxPublisher;
use airline_booking_system::routes::{booking_route, flight_route, ticket_route, user_route};
use airline_booking_system::saga::{BookingSaga, SagaConfig};
use airline_booking_system::services::user_service::UserService;
use airline_booking_system::sweeper::ExpirationSweeper;
use airline_booking_system::swagger::swagger_ui;

/// Composition root (SPEC_FULL.md §10.1). Wires every port to its concrete
/// adapter and mounts a thin Rocket shell over the saga/engine — this layer
/// sits outside spec.md's scope (§1 Non-goals exclude the outer HTTP API)
/// and exists only to exercise the core components end to end.
#[launch]
async fn rocket() -> _ {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    register_core_metrics();

    let config = Config::from_env();

    let database = Database::new(&config.database.url, config.database.max_connections)
        .await
        .expect("failed to connect to database");
    let pool = database.pool.clone();
    let uow = UnitOfWork::new(pool.clone());

    let flight_repo: Arc<dyn FlightInventoryRepository> =
        Arc::new(PgFlightInventoryRepository::new(pool.clone()));
    let booking_repo: Arc<dyn BookingRepository> = Arc::new(PgBookingRepository::new(pool.clone()));
    let ticket_repo: Arc<dyn TicketRepository> = Arc::new(PgTicketRepository::new(pool.clone()));
    let outbox_repo: Arc<dyn OutboxRepository> = Arc::new(PgOutboxRepository::new(pool.clone()));

    let inventory: Arc<InventoryEngine> = InventoryEngine::new(
        flight_repo.clone(),
        uow.clone(),
        config.inventory.queue_capacity,
        config.inventory.hold_duration,
    );

    // The payment and notification provider SDKs are external collaborators
    // out of spec.md's scope (§1 Non-goals) — mocks stand in for them here.
    let payment: Arc<dyn PaymentGateway> = Arc::new(MockPaymentGateway::default());
    let notification: Arc<dyn NotificationGateway> = Arc::new(MockNotificationGateway::default());

    let saga = Arc::new(BookingSaga::new(
        inventory.clone(),
        booking_repo.clone(),
        ticket_repo.clone(),
        payment,
        notification,
        uow.clone(),
        SagaConfig::default(),
    ));

    let sweeper = Arc::new(ExpirationSweeper::new(
        booking_repo,
        inventory.clone(),
        uow.clone(),
        config.sweeper.interval,
        config.sweeper.page_size,
    ));
    let _sweeper_handle = sweeper.spawn();

    let publisher = Arc::new(OutboxPublisher::new(
        outbox_repo,
        HashMap::new(),
        config.outbox.poll_interval,
        config.outbox.batch_size,
        config.outbox.max_retries,
    ));
    let _publisher_handle = publisher.spawn();

    let user_service = UserService::new(pool.clone());

    rocket::build()
        .manage(saga)
        .manage(inventory)
        .manage(flight_repo)
        .manage(ticket_repo)
        .manage(user_service)
        .mount(
            "/api",
            openapi_get_routes![
                user_route::register,
                user_route::login,
                booking_route::book_flight,
                booking_route::confirm_booking,
                flight_route::get_availability,
                flight_route::search_flights,
                ticket_route::get_tickets_by_pnr,
            ],
        )
        .mount("/swagger", make_swagger_ui(&swagger_ui()))
        .attach(AdHoc::on_response("CORS", |_, res| {
            Box::pin(async move {
                res.set_header(rocket::http::Header::new(
                    "Access-Control-Allow-Origin",
                    "*",
                ));
            })
        }))
}
