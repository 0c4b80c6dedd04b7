//! PostgreSQL pool setup and schema migrations.

use std::time::Duration;

use sqlx::{Pool, Postgres, postgres::PgPoolOptions};

pub type DbPool = Pool<Postgres>;

/// How long a request waits for a pooled connection before failing with 503.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect a pool of at most `max_connections`.
///
/// Issuance keeps one connection for the duration of its transaction, so the
/// pool size bounds how many principals can mint keys at the same moment.
///
/// # Errors
///
/// Fails if the URL is invalid or the server refuses the connection.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
}

/// Apply pending files from `migrations/`, each at most once.
///
/// The billing columns of `profiles` belong to the billing service; the
/// migrations only create them when the table is absent.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
