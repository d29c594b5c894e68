//! Throwaway databases with the schema applied.

use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use uuid::Uuid;

/// Environment variable naming the maintenance database.
pub const DATABASE_URL_ENV: &str = "CUEFLOW_TEST_DATABASE_URL";

/// Schema migrations, in order.
pub const MIGRATIONS: [&str; 3] = [
    include_str!("../../migrations/2026-01-10-000000_create_queue/up.sql"),
    include_str!("../../migrations/2026-01-10-000100_create_workflows/up.sql"),
    include_str!("../../migrations/2026-01-10-000200_create_transcriptions/up.sql"),
];

/// Connection pool over a temporary database.
pub type TestPool = Pool<ConnectionManager<PgConnection>>;

/// A migrated database dropped when this value is.
pub struct TemporaryDatabase {
    admin_url: String,
    name: String,
    url: String,
    pool: TestPool,
}

impl TemporaryDatabase {
    /// Creates and migrates a database, or returns `None` when no server is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the database or a migration.
    pub fn create() -> eyre::Result<Option<Self>> {
        let Ok(admin_url) = std::env::var(DATABASE_URL_ENV) else {
            return Ok(None);
        };
        let name = format!("cueflow_test_{}", Uuid::new_v4().simple());
        let mut admin = PgConnection::establish(&admin_url)?;
        admin.batch_execute(&format!("CREATE DATABASE {name}"))?;
        let url = database_url(&admin_url, &name)?;
        let mut connection = PgConnection::establish(&url)?;
        for migration in MIGRATIONS {
            connection.batch_execute(migration)?;
        }
        let pool = sized_pool(&url, 8)?;
        Ok(Some(Self {
            admin_url,
            name,
            url,
            pool,
        }))
    }

    /// Pool over the temporary database.
    #[must_use]
    pub fn pool(&self) -> TestPool {
        self.pool.clone()
    }

    /// A separate pool over the temporary database holding at most `size`
    /// connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot open its first connection.
    pub fn pool_of_size(&self, size: u32) -> eyre::Result<TestPool> {
        sized_pool(&self.url, size)
    }
}

fn sized_pool(url: &str, size: u32) -> eyre::Result<TestPool> {
    Ok(Pool::builder()
        .max_size(size)
        .connection_timeout(std::time::Duration::from_secs(5))
        .build(ConnectionManager::<PgConnection>::new(url))?)
}

impl Drop for TemporaryDatabase {
    fn drop(&mut self) {
        let dropped = PgConnection::establish(&self.admin_url).map(|mut admin| {
            admin.batch_execute(&format!(
                "DROP DATABASE IF EXISTS {} WITH (FORCE)",
                self.name
            ))
        });
        if !matches!(dropped, Ok(Ok(()))) {
            tracing::warn!(database = %self.name, "temporary database left behind");
        }
    }
}

fn database_url(admin_url: &str, name: &str) -> eyre::Result<String> {
    let (server, _) = admin_url
        .rsplit_once('/')
        .ok_or_else(|| eyre::eyre!("{DATABASE_URL_ENV} must name a database"))?;
    Ok(format!("{server}/{name}"))
}
