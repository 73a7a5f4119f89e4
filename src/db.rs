use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

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
            min_connections: cfg.db_min_connections.min(cfg.db_max_connections),
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, DbErr> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    gauge!("office_db.max_connections", config.max_connections as f64);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection establishment failed: {}", e);
        e
    })?;

    info!("Database connection pool established successfully");
    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Runs the embedded migrations
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbErr> {
    info!("Running database migrations");
    let start = std::time::Instant::now();

    let result = crate::migrator::Migrator::up(pool, None).await;

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
pub async fn check_connection(pool: &DbPool) -> Result<(), DbErr> {
    let start = std::time::Instant::now();
    let result = pool.ping().await;

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => gauge!("office_db.connection_latency", elapsed.as_millis() as f64),
        Err(e) => {
            error!(
                "Database connection check failed after {:?}: {}",
                elapsed, e
            );
            counter!("office_db.connection_failures", 1);
        }
    }

    result
}

/// How often a unit of work is re-run when the database reports lock
/// contention or a serialization failure.
#[derive(Debug, Clone, Copy)]
pub struct ContentionRetry {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for ContentionRetry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

impl From<&AppConfig> for ContentionRetry {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            max_attempts: cfg.ledger_retry_attempts.max(1),
            backoff: Duration::from_millis(cfg.ledger_retry_backoff_ms),
        }
    }
}

/// True when the driver error means "another writer got there first" rather
/// than a real failure: SQLite busy/locked, Postgres serialization failure
/// (40001) or deadlock (40P01).
pub fn is_contention(err: &DbErr) -> bool {
    let text = err.to_string().to_ascii_lowercase();
    text.contains("database is locked")
        || text.contains("database is busy")
        || text.contains("sqlite_busy")
        || text.contains("40001")
        || text.contains("40p01")
        || text.contains("could not serialize")
        || text.contains("deadlock detected")
}

fn is_contention_error(err: &ServiceError) -> bool {
    matches!(err, ServiceError::DatabaseError(db) if is_contention(db))
}

/// Runs `operation` (which opens and commits its own transaction) and re-runs
/// it with linear backoff while it fails on contention. Once attempts are
/// exhausted the contention surfaces as `Conflict`; every other error is
/// returned untouched on first occurrence.
pub async fn retry_on_contention<F, Fut, T>(
    retry: ContentionRetry,
    operation_name: &'static str,
    mut operation: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if is_contention_error(&err) => {
                counter!("office_db.contention", 1, "operation" => operation_name);
                if attempt >= retry.max_attempts {
                    warn!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %err,
                        "giving up on contended write"
                    );
                    return Err(ServiceError::Conflict(
                        "Concurrent update in progress, please retry".to_string(),
                    ));
                }
                let delay = retry.backoff * attempt;
                debug!(operation = operation_name, attempt, ?delay, "contention, retrying");
                sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn locked() -> ServiceError {
        ServiceError::DatabaseError(DbErr::Custom(
            "error returned from database: (code: 5) database is locked".into(),
        ))
    }

    fn fast(max_attempts: u32) -> ContentionRetry {
        ContentionRetry {
            max_attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn detects_driver_contention_messages() {
        assert!(is_contention(&DbErr::Custom("database is locked".into())));
        assert!(is_contention(&DbErr::Custom(
            "could not serialize access due to concurrent update".into()
        )));
        assert!(is_contention(&DbErr::Custom("SQLSTATE 40P01".into())));
        assert!(!is_contention(&DbErr::Custom(
            "UNIQUE constraint failed".into()
        )));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_on_contention(fast(3), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(locked())
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_contention_becomes_conflict() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_on_contention(fast(2), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(locked())
        })
        .await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_on_contention(fast(5), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::InsufficientStock {
                requested: 3,
                available: 1,
            })
        })
        .await;
        assert!(matches!(
            result,
            Err(ServiceError::InsufficientStock { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
