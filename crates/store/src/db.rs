//! SQLite pool setup.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::PathBuf;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Where the tracker database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A database file, created on first use. Its directory must exist.
    File(PathBuf),
    /// A private database that disappears with the pool.
    Memory,
}
impl Location {
    fn connect_options(&self) -> SqliteConnectOptions {
        let options = SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            // Dashboard reads can overlap a polling write.
            .busy_timeout(Duration::from_millis(1500));
        match self {
            Self::File(path) => options.filename(path).create_if_missing(true),
            Self::Memory => options.filename(":memory:"),
        }
    }

    /// Every in-memory connection opens a database of its own, so the pool
    /// must never hold more than one.
    fn max_connections(&self) -> u32 {
        match self {
            Self::File(_) => 4,
            Self::Memory => 1,
        }
    }
}

/// Migrated connection pool for the tracker database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    #[instrument(level = "debug", err(Debug))]
    pub async fn open(location: Location) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(location.max_connections())
            .after_connect(|conn, meta| Box::pin(async move { tune(conn, meta).await }))
            .connect_with(location.connect_options())
            .await
            .or_raise(|| ErrorKind::Database)?;
        MIGRATOR.run(&pool).await.or_raise(|| ErrorKind::Migration)?;
        Ok(Self { pool })
    }

    pub async fn connect(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(Location::File(path.into())).await
    }

    /// In-memory database with the full schema, for tests here and in other
    /// crates.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::open(Location::Memory).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Let SQLite refresh its planner statistics, then close every
    /// connection once it is returned to the pool.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

/// Per-connection settings that [`SqliteConnectOptions`] does not cover.
async fn tune(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
    sqlx::query("PRAGMA wal_autocheckpoint = 400; PRAGMA cache_size = -2048; PRAGMA temp_store = MEMORY;")
        .execute(conn)
        .await?;
    Ok(())
}
