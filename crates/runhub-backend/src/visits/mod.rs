//! Page-visit persistence.
//!
//! One row per visit (client IP and a millisecond timestamp) in a local
//! SQLite file behind an r2d2 pool. Blocking database work runs on the
//! tokio blocking pool so handlers never stall the runtime.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::error::{VisitResult, VisitStoreError};

const BUSY_TIMEOUT: Duration = Duration::from_millis(2000);
const POOL_MAX_SIZE: u32 = 4;
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS visits (
    id INTEGER PRIMARY KEY,
    ip TEXT NOT NULL,
    visited_at INTEGER NOT NULL
)";

/// SQLite-backed visit counter.
#[derive(Clone)]
pub struct VisitStore {
    pool: Pool<SqliteConnectionManager>,
    path: String,
}

impl VisitStore {
    /// Open (or create) the store at `path` and ensure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns error if the pool cannot be built or the schema cannot be
    /// created.
    pub fn open(path: &str) -> VisitResult<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;\nPRAGMA synchronous = NORMAL;")
        });

        let pool = Pool::builder()
            .max_size(POOL_MAX_SIZE)
            .connection_timeout(POOL_CONNECTION_TIMEOUT)
            .build(manager)?;

        let conn = pool.get()?;
        conn.execute(SCHEMA, [])?;

        Ok(Self { pool, path: path.to_string() })
    }

    /// Record one visit from `ip` at `visited_at` (epoch milliseconds).
    ///
    /// # Errors
    ///
    /// Returns error on pool or SQL failure.
    pub async fn record(&self, ip: String, visited_at: i64) -> VisitResult<()> {
        let pool = self.pool.clone();
        run_blocking("visits_record", move || {
            let conn = pool.get()?;
            conn.execute(
                "INSERT INTO visits (ip, visited_at) VALUES (?1, ?2)",
                rusqlite::params![ip, visited_at],
            )?;
            Ok(())
        })
        .await
    }

    /// Total number of recorded visits.
    ///
    /// # Errors
    ///
    /// Returns error on pool or SQL failure.
    pub async fn count(&self) -> VisitResult<i64> {
        let pool = self.pool.clone();
        run_blocking("visits_count", move || {
            let conn = pool.get()?;
            let count = conn.query_row("SELECT COUNT(*) FROM visits", [], |row| row.get(0))?;
            Ok(count)
        })
        .await
    }

    /// Backing database file path, for the index page.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for VisitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisitStore").field("path", &self.path).finish()
    }
}

/// Run blocking database work on the tokio blocking pool.
async fn run_blocking<T>(
    label: &'static str,
    f: impl FnOnce() -> VisitResult<T> + Send + 'static,
) -> VisitResult<T>
where
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(err) => {
            if err.is_panic() {
                tracing::error!(label, "blocking task panicked");
                return Err(VisitStoreError::Task(format!("{label}: task panicked")));
            }
            tracing::warn!(label, "blocking task cancelled");
            Err(VisitStoreError::Task(format!("{label}: task cancelled")))
        }
    }
}
