//! Database connection and pool management.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::migrate::Migrator;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

static CONTENT_MIGRATOR: Migrator = sqlx::migrate!("./migrations/content");
static FACETS_MIGRATOR: Migrator = sqlx::migrate!("./migrations/facets");
const MAX_CONNECTIONS: u32 = 5;

/// Which of the two indexes a database holds. Each has its own schema and
/// its own embedded migrations, run automatically on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Catalog {
    Content,
    Facets,
}
impl Catalog {
    fn migrator(self) -> &'static Migrator {
        match self {
            Self::Content => &CONTENT_MIGRATOR,
            Self::Facets => &FACETS_MIGRATOR,
        }
    }
}

/// Connection pool for one index database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    catalog: Catalog,
}

impl Database {
    async fn new(options: SqliteConnectOptions, catalog: Catalog, max: Option<u32>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Apply the query-based PRAGMAs to every pooled connection, not
            // only the first.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max.unwrap_or(MAX_CONNECTIONS))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool, catalog };
        db.migrate().await?;
        Ok(db)
    }

    /// Connect to the database at the given path, creating it if needed.
    pub async fn connect(path: impl AsRef<Path>, catalog: Catalog) -> Result<Self> {
        let options = Self::base_options().filename(path.as_ref()).create_if_missing(true);
        Self::new(options, catalog, None).await
    }

    /// Connect to an in-memory database.
    ///
    /// Not gated behind `#[cfg(test)]` so that other crates can use it in
    /// their tests, and for the `memory` database backend.
    pub async fn connect_in_memory(catalog: Catalog) -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // Every connection to `:memory:` is a separate database.
        Self::new(options, catalog, Some(1)).await
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            // A full reload writes thousands of rows while the reconciliation
            // loop may be writing too.
            .busy_timeout(std::time::Duration::from_millis(1500))
            .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::None)
    }

    /// Apply PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    #[instrument("performing database migrations", skip(self), fields(catalog = ?self.catalog))]
    async fn migrate(&self) -> Result<()> {
        self.catalog.migrator().run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn catalog(&self) -> Catalog {
        self.catalog
    }

    /// Wait for every connection to be returned, then close the pool. The
    /// database must not be used afterwards.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Catalog::Content, "content")]
    #[case(Catalog::Facets, "facets")]
    #[tokio::test]
    async fn test_connect_in_memory(#[case] catalog: Catalog, #[case] table: &str) {
        let db = Database::connect_in_memory(catalog).await.unwrap();
        assert!(!db.pool().is_closed());
        assert_eq!(db.catalog(), catalog);
        let found: Option<String> = sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_optional(db.pool())
            .await
            .unwrap();
        assert_eq!(found.as_deref(), Some(table));
        db.close().await;
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::connect_in_memory(Catalog::Content).await.unwrap();
        db.migrate().await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_pragmas_are_applied() {
        let db = Database::connect_in_memory(Catalog::Content).await.unwrap();
        let row: (i64,) = sqlx::query_as("PRAGMA foreign_keys").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 1, "foreign_keys should be ON");
        let row: (i64,) = sqlx::query_as("PRAGMA wal_autocheckpoint").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 800);
        db.close().await;
    }
}
