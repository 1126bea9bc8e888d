pub mod booking_repo;
pub mod flight_inventory_repo;
pub mod outbox_repo;
pub mod ticket_repo;
