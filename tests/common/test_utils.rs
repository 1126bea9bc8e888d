use dotenvy::dotenv;
use once_cell::sync::OnceCell;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Error, PgPool as Pool};
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

static TEST_DB: OnceCell<Mutex<Option<TestDb>>> = OnceCell::new();
static DB_NAME: OnceCell<String> = OnceCell::new();

#[derive(Debug)]
pub struct TestDb {
    pub db_name: String,
}

// Connect to the `postgres` maintenance database, used to create/drop the test database.
async fn create_connection_pool_without_db() -> Result<Pool, Error> {
    dotenv().ok();
    let db_url =
        env::var("ADMIN_DATABASE_URL").expect("ADMIN_DATABASE_URL must be set in .env file");
    let base_url = db_url.rsplit_once('/').map(|(base, _)| base).unwrap_or(&db_url);

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&format!("{base_url}/postgres"))
        .await
}

async fn create_connection_pool_with_db(db_name: &str) -> Result<Pool, Error> {
    dotenv().ok();
    let db_url =
        env::var("ADMIN_DATABASE_URL").expect("ADMIN_DATABASE_URL must be set in .env file");
    let base_url = db_url.rsplit_once('/').map(|(base, _)| base).unwrap_or(&db_url);

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&format!("{base_url}/{db_name}"))
        .await
}

impl TestDb {
    /// Gets (and lazily creates) the database shared by every test in one
    /// test binary, then hands back a fresh connection pool for this test.
    pub async fn get_instance(file_path: &str) -> Result<Pool, Error> {
        let test_name = file_path
            .split(['/', '\\'])
            .last()
            .unwrap_or(file_path)
            .trim_end_matches(".rs");

        let test_db = TEST_DB.get_or_init(|| Mutex::new(None));
        let mut guard = test_db.lock().await;

        if guard.is_none() {
            println!("Creating new database instance for {test_name}");
            *guard = Some(Self::setup_database(test_name).await?);
        }

        let db_name = guard.as_ref().unwrap().db_name.clone();
        drop(guard);

        create_connection_pool_with_db(&db_name).await
    }

    async fn setup_database(test_name: &str) -> Result<Self, Error> {
        let db_name = DB_NAME
            .get_or_init(|| {
                let timestamp = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap()
                    .as_secs();
                format!("airline_test_{test_name}_{timestamp}")
            })
            .clone();

        println!("Setting up database: {db_name}");
        let admin_pool = create_connection_pool_without_db().await?;

        sqlx::query(&format!("CREATE DATABASE {db_name}"))
            .execute(&admin_pool)
            .await?;

        let pool = create_connection_pool_with_db(&db_name).await?;
        Self::create_tables(&pool).await?;

        Ok(Self { db_name })
    }

    async fn create_tables(pool: &Pool) -> Result<(), Error> {
        let tables = vec![
            "CREATE TABLE IF NOT EXISTS app_user (
                id SERIAL PRIMARY KEY,
                username VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(32) NOT NULL DEFAULT 'USER'
            )",
            "CREATE TABLE IF NOT EXISTS customer_info (
                id INT PRIMARY KEY REFERENCES app_user(id) ON DELETE CASCADE,
                name VARCHAR(255) NOT NULL,
                birth_date DATE NOT NULL,
                gender VARCHAR(16) NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS flight_inventory (
                flight_id UUID PRIMARY KEY,
                version BIGINT NOT NULL,
                last_updated TIMESTAMPTZ NOT NULL,
                economy_capacity INT NOT NULL,
                economy_available INT NOT NULL,
                economy_price_amount BIGINT NOT NULL,
                economy_price_currency VARCHAR(8) NOT NULL,
                business_capacity INT NOT NULL,
                business_available INT NOT NULL,
                business_price_amount BIGINT NOT NULL,
                business_price_currency VARCHAR(8) NOT NULL,
                first_capacity INT NOT NULL,
                first_available INT NOT NULL,
                first_price_amount BIGINT NOT NULL,
                first_price_currency VARCHAR(8) NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS bookings (
                id UUID PRIMARY KEY,
                pnr_code VARCHAR(6) NOT NULL UNIQUE,
                status VARCHAR(16) NOT NULL,
                version BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ,
                updated_at TIMESTAMPTZ NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS passengers (
                id UUID PRIMARY KEY,
                booking_id UUID NOT NULL REFERENCES bookings(id) ON DELETE CASCADE,
                name VARCHAR(255) NOT NULL,
                date_of_birth DATE NOT NULL,
                gender VARCHAR(16) NOT NULL,
                passenger_type VARCHAR(16) NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS segments (
                id UUID PRIMARY KEY,
                booking_id UUID NOT NULL REFERENCES bookings(id) ON DELETE CASCADE,
                flight_id UUID NOT NULL,
                cabin VARCHAR(16) NOT NULL,
                price_amount BIGINT NOT NULL,
                price_currency VARCHAR(8) NOT NULL,
                seat_number VARCHAR(8)
            )",
            "CREATE TABLE IF NOT EXISTS tickets (
                ticket_number VARCHAR(13) PRIMARY KEY,
                pnr VARCHAR(6) NOT NULL,
                status VARCHAR(16) NOT NULL,
                passenger_id UUID NOT NULL,
                passenger_name VARCHAR(255) NOT NULL,
                issued_at TIMESTAMPTZ NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS coupons (
                ticket_number VARCHAR(13) NOT NULL REFERENCES tickets(ticket_number) ON DELETE CASCADE,
                coupon_number INT NOT NULL,
                flight_id UUID NOT NULL,
                seat_number VARCHAR(8),
                status VARCHAR(16) NOT NULL,
                PRIMARY KEY (ticket_number, coupon_number)
            )",
            "CREATE TABLE IF NOT EXISTS event_outbox (
                id UUID PRIMARY KEY,
                event_type VARCHAR(64) NOT NULL,
                aggregate_id UUID NOT NULL,
                payload JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                published_at TIMESTAMPTZ,
                retry_count INT NOT NULL DEFAULT 0
            )",
        ];

        for create_sql in tables {
            sqlx::query(create_sql).execute(pool).await?;
        }

        Ok(())
    }

    /// Drops the shared test database after the whole test binary finishes
    /// (registered via `ctor::dtor` in each test file, not per-test).
    pub fn cleanup_database_sync() -> Result<(), Box<dyn std::error::Error>> {
        dotenv().ok();

        let db_url = env::var("ADMIN_DATABASE_URL").expect("ADMIN_DATABASE_URL must be set in .env file");
        let base_url = db_url.rsplit_once('/').map(|(base, _)| base.to_string()).unwrap_or(db_url);

        if let Some(db_name) = DB_NAME.get() {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let admin_pool = PgPoolOptions::new()
                    .max_connections(2)
                    .connect(&format!("{base_url}/postgres"))
                    .await?;
                sqlx::query(&format!(
                    "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = '{db_name}'"
                ))
                .execute(&admin_pool)
                .await?;
                sqlx::query(&format!("DROP DATABASE IF EXISTS {db_name}"))
                    .execute(&admin_pool)
                    .await?;
                Ok::<_, sqlx::Error>(())
            })?;
        }
        Ok(())
    }
}
