//! PostgreSQL connection pool.

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// Postgres-backed adapter for the success and error ledgers.
#[derive(Clone)]
pub struct PgLedger {
    pub(super) pool: PgPool,
}

impl PgLedger {
    /// Connect and verify the connection with a round trip.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        info!("Connected to database");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}
