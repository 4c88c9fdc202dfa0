use crate::config::AppConfig;
use crate::errors::ServiceError;
use futures::future::BoxFuture;
use metrics::{counter, gauge, histogram};
use sea_orm::{
    ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
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
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database
///
/// # Errors
/// Returns a `ServiceError` if the connection cannot be established
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(true);

    gauge!("orderflow_db.max_connections", config.max_connections as f64);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection establishment failed: {}", e);
        ServiceError::DatabaseError(e)
    })?;

    info!("Database connection pool established successfully");

    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Database access wrapper giving every multi-row mutation the same
/// transaction entry point, with built-in metrics and error handling.
#[derive(Debug, Clone)]
pub struct DatabaseAccess {
    pool: Arc<DbPool>,
}

impl DatabaseAccess {
    /// Create a new database access instance
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool
    pub fn get_pool(&self) -> &DbPool {
        &self.pool
    }

    /// Run `f` inside one transaction. Commit on Ok, roll back on Err;
    /// no intermediate state is observable either way.
    pub async fn transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<T, E>> + Send,
        T: Send + 'static,
        E: From<DbErr> + Send + 'static + std::error::Error,
    {
        let db = &*self.pool;
        let transaction_id = Uuid::new_v4();
        let start = std::time::Instant::now();

        debug!(transaction_id = %transaction_id, "Starting database transaction");
        counter!("orderflow_db.transaction.started", 1);

        let result = db
            .transaction(move |txn| {
                let future = f(txn);
                Box::pin(async move {
                    let result = future.await;
                    debug!(transaction_id = %transaction_id, "Transaction completed");
                    result
                })
            })
            .await;

        let elapsed = start.elapsed();
        histogram!("orderflow_db.transaction.duration", elapsed);

        match &result {
            Ok(_) => {
                counter!("orderflow_db.transaction.committed", 1);
                debug!(transaction_id = %transaction_id, "Transaction committed successfully in {:?}", elapsed);
            }
            Err(_) => {
                counter!("orderflow_db.transaction.rolled_back", 1);
                warn!(transaction_id = %transaction_id, "Transaction rolled back after {:?}", elapsed);
            }
        }

        result.map_err(|e| match e {
            sea_orm::TransactionError::Connection(e) => E::from(e),
            sea_orm::TransactionError::Transaction(e) => e,
        })
    }
}

/// Runs database migrations
///
/// # Errors
/// Returns a `ServiceError` if migrations fail to execute
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    let start = std::time::Instant::now();

    let result = crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!(
            "Database migrations completed successfully in {:?}",
            elapsed
        ),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    debug!("Checking database connection");
    let start = std::time::Instant::now();

    let result = pool.ping().await.map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => {
            debug!("Database connection check successful in {:?}", elapsed);
            gauge!(
                "orderflow_db.connection_latency",
                elapsed.as_millis() as f64
            );
        }
        Err(e) => {
            error!(
                "Database connection check failed after {:?}: {}",
                elapsed, e
            );
            counter!("orderflow_db.connection_failures", 1);
        }
    }

    result
}

/// Closes the database connection pool
pub async fn close_pool(pool: DbPool) -> Result<(), ServiceError> {
    info!("Closing database connection pool");

    pool.close().await.map_err(ServiceError::DatabaseError)
}
