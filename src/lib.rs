//! Library crate for the airline seat-booking transactional core. `main.rs`
//! is a thin binary that wires these modules into a runnable Rocket process;
//! every module here is also exercised directly by the integration tests
//! under `tests/`.

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod inventory;
pub mod metrics;
pub mod models;
pub mod persistence;
pub mod ports;
pub mod publisher;
pub mod retry;
pub mod routes;
pub mod saga;
pub mod services;
pub mod sweeper;
pub mod swagger;
pub mod utils;
