//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  DbConfig::new(path) / from_env() / in_memory()                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │  (max_connections)        │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  busy_timeout =           │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │    lock_timeout           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├── products() / lots() / sales()   plain reads and catalog      │
//! │       └── ledger()                        BEGIN IMMEDIATE transactions │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! Readers never block the ledger writer and the writer never blocks
//! readers. Writers serialize on the database write lock; a writer that
//! can't get it within `lock_timeout` fails with `DbError::Contention`.

use apoteca_core::validation::validate_days;
use apoteca_core::{DEFAULT_RETURN_LOT_DAYS, MAX_DAYS_AHEAD};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::ledger::{Ledger, LedgerSettings};
use crate::migrations;
use crate::repository::lot::LotRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sale::SaleRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Environment variable for the database file path.
pub const ENV_DB_PATH: &str = "APOTECA_DB_PATH";
/// Environment variable for the pool size.
pub const ENV_MAX_CONNECTIONS: &str = "APOTECA_MAX_CONNECTIONS";
/// Environment variable for the write-lock wait, in milliseconds.
pub const ENV_LOCK_TIMEOUT_MS: &str = "APOTECA_LOCK_TIMEOUT_MS";
/// Environment variable for the shelf life of synthetic return lots.
pub const ENV_RETURN_LOT_DAYS: &str = "APOTECA_RETURN_LOT_DAYS";

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/apoteca/apoteca.db")
///     .max_connections(5)
///     .lock_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection acquire timeout.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a ledger transaction waits for the write lock.
    /// Default: 5 seconds
    pub lock_timeout: Duration,

    /// Days until a synthetic return lot expires.
    /// Default: 365
    pub return_lot_shelf_life_days: i64,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            lock_timeout: Duration::from_secs(5),
            return_lot_shelf_life_days: DEFAULT_RETURN_LOT_DAYS,
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the write-lock wait for ledger transactions.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the shelf life of synthetic return lots, clamped to
    /// `0..=MAX_DAYS_AHEAD`.
    pub fn return_lot_shelf_life_days(mut self, days: i64) -> Self {
        self.return_lot_shelf_life_days = days.clamp(0, MAX_DAYS_AHEAD);
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory()).await?;
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            lock_timeout: Duration::from_secs(5),
            return_lot_shelf_life_days: DEFAULT_RETURN_LOT_DAYS,
            run_migrations: true,
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// ## Variables
    /// ```text
    /// APOTECA_DB_PATH          database file       (default ./apoteca.db)
    /// APOTECA_MAX_CONNECTIONS  pool size           (default 5)
    /// APOTECA_LOCK_TIMEOUT_MS  write-lock wait     (default 5000)
    /// APOTECA_RETURN_LOT_DAYS  return lot life     (default 365)
    /// ```
    ///
    /// Unparseable or out-of-range values fall back to the default with a
    /// warning.
    pub fn from_env() -> Self {
        let path = std::env::var(ENV_DB_PATH).unwrap_or_else(|_| "./apoteca.db".to_string());
        let mut config = DbConfig::new(path);

        if let Some(max) = env_parse::<u32>(ENV_MAX_CONNECTIONS) {
            config.max_connections = max.max(1);
        }
        if let Some(ms) = env_parse::<u64>(ENV_LOCK_TIMEOUT_MS) {
            config.lock_timeout = Duration::from_millis(ms);
        }
        if let Some(days) = env_parse::<i64>(ENV_RETURN_LOT_DAYS) {
            match validate_days(ENV_RETURN_LOT_DAYS, days) {
                Ok(()) => config.return_lot_shelf_life_days = days,
                Err(err) => warn!(error = %err, "Ignoring out-of-range environment value"),
            }
        }

        config
    }

    fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            return_lot_shelf_life_days: self.return_lot_shelf_life_days,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key = %key, value = %raw, "Ignoring unparseable environment value");
            None
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository and ledger access.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::from_env()).await?;
///
/// let record = db.ledger().settle(&request).await?;
/// let stock = db.ledger().total_available(&product_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    settings: LedgerSettings,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous
    ///    - Foreign keys enabled
    ///    - `busy_timeout` set to the ledger lock wait
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default for backwards compatibility
            .foreign_keys(true)
            // Waiters on BEGIN IMMEDIATE give up after this and surface SQLITE_BUSY
            .busy_timeout(config.lock_timeout)
            .create_if_missing(true);

        debug!(lock_timeout_ms = config.lock_timeout.as_millis() as u64, "Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            settings: config.ledger_settings(),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    ///
    /// Prefer repository and ledger methods; writes to `lots` outside the
    /// ledger bypass its locking.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the product repository.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Returns the read-only lot repository.
    pub fn lots(&self) -> LotRepository {
        LotRepository::new(self.pool.clone())
    }

    /// Returns the sale repository.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    /// Returns the stock ledger service.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let plan = db.ledger().deplete(&product_id, 25).await?;
    /// ```
    pub fn ledger(&self) -> Ledger {
        Ledger::new(self.pool.clone(), self.settings.clone())
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
