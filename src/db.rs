use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Database connection manager.
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }
}
