use crate::config::AppConfig;
use crate::errors::ServiceError;
use anyhow::Context;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, QuerySelect,
    Select,
};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{debug, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 16,
            min_connections: 2,
            connect_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database
///
/// # Errors
/// Returns a `ServiceError` if the connection cannot be established
pub async fn establish_connection(database_url: &str) -> Result<DbPool, anyhow::Error> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, anyhow::Error> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(false);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt)
        .await
        .context("Database connection establishment failed")?;

    info!("Database connection pool established successfully");

    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, anyhow::Error> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Runs all pending migrations
pub async fn run_migrations(db: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    crate::migrator::Migrator::up(db, None)
        .await
        .map_err(ServiceError::DatabaseError)?;
    info!("Database migrations completed");
    Ok(())
}

/// Applies a pessimistic `FOR UPDATE` row lock to a select where the backend
/// supports it. SQLite (used by the test harness) serializes writers at the
/// database level, so the unlocked select is equivalent there.
pub fn lock_for_update<E>(select: Select<E>, backend: DbBackend) -> Select<E>
where
    E: sea_orm::EntityTrait,
{
    match backend {
        DbBackend::Postgres | DbBackend::MySql => select.lock_exclusive(),
        _ => select,
    }
}

/// SQL that caps statement time for the current transaction, so a stalled
/// client cannot pin a locked row indefinitely. Postgres only; SQLite
/// serializes writers at the database level and has no statement timeout.
pub fn statement_timeout_sql(backend: DbBackend, timeout: Duration) -> Option<String> {
    match backend {
        DbBackend::Postgres => Some(format!(
            "SET LOCAL statement_timeout = {}",
            timeout.as_millis().max(1)
        )),
        _ => None,
    }
}

/// Applies the statement timeout inside a lock-holding transaction. A
/// timeout firing later surfaces as a retryable `Busy` via `map_lock_err`.
pub async fn apply_statement_timeout<C: ConnectionTrait>(
    conn: &C,
    timeout: Duration,
) -> Result<(), DbErr> {
    if let Some(sql) = statement_timeout_sql(conn.get_database_backend(), timeout) {
        conn.execute_unprepared(&sql).await?;
    }
    Ok(())
}
