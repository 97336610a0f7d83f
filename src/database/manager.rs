use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from the data access layer. "No rows" is never an error; callers
/// get `Ok(None)` / `Ok(vec![])` for that and one of these for failures.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Statement exceeded {0:?}")]
    Timeout(Duration),

    #[error("Statement has {placeholders} placeholders but {params} parameters")]
    ArityMismatch { placeholders: usize, params: usize },

    #[error("Unique constraint violated: {}", .0.as_deref().unwrap_or("unknown"))]
    UniqueViolation(Option<String>),

    #[error("Foreign key constraint violated: {}", .0.as_deref().unwrap_or("unknown"))]
    ForeignKeyViolation(Option<String>),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => DatabaseError::Unavailable(err.to_string()),
            sqlx::Error::Database(db) => {
                let constraint = db.constraint().map(str::to_string);
                let code = db.code().map(|c| c.into_owned());
                match code.as_deref() {
                    Some("23505") => DatabaseError::UniqueViolation(constraint),
                    Some("23503") => DatabaseError::ForeignKeyViolation(constraint),
                    _ => DatabaseError::Sqlx(sqlx::Error::Database(db)),
                }
            }
            other => DatabaseError::Sqlx(other),
        }
    }
}

/// Builds and owns the connection pool for the configured database
pub struct DatabaseManager;

impl DatabaseManager {
    /// Create the pool without opening a connection; the first query does.
    /// Lets the process come up (and answer `/ping`) while the database is down.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        Self::validate_url(&config.url)?;

        let pool = Self::pool_options(config)
            .connect_lazy(&config.url)
            .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;

        info!(max_connections = config.max_connections, "Created lazy database pool");
        Ok(pool)
    }

    /// Create the pool and fail fast when the database is unreachable
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        Self::validate_url(&config.url)?;

        let pool = Self::pool_options(config).connect(&config.url).await?;

        info!(max_connections = config.max_connections, "Connected database pool");
        Ok(pool)
    }

    fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
    }

    fn validate_url(raw: &str) -> Result<(), DatabaseError> {
        let url = url::Url::parse(raw).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        match url.scheme() {
            "postgres" | "postgresql" => Ok(()),
            _ => Err(DatabaseError::InvalidDatabaseUrl),
        }
    }

    /// Apply the embedded migrations under `migrations/`
    pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool, timeout: Duration) -> Result<(), DatabaseError> {
        tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(pool))
            .await
            .map_err(|_| DatabaseError::Timeout(timeout))??;
        Ok(())
    }
}
