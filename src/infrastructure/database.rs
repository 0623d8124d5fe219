//! Pooled SQLite connection

use di::inject;
use di::injectable;
use log::info;
use sqlx::SqlitePool;
use sqlx::migrate::MigrateError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::env;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::sync::Mutex;

/// Pool handed to every DI-created connection once installed.
static INSTALLED_POOL: Mutex<Option<SqlitePool>> = Mutex::new(None);

pub struct DatabaseConnection {
    connection: SqlitePool,
}

#[injectable]
impl DatabaseConnection {
    #[inject]
    pub fn create() -> DatabaseConnection {
        if let Some(pool) = Self::installed_pool() {
            return DatabaseConnection { connection: pool };
        }

        dotenvy::dotenv().ok();
        let connection_string = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let pool = Self::connect_lazy(&connection_string, 5).expect("Cannot connect to database");

        DatabaseConnection { connection: pool }
    }
}

impl DatabaseConnection {
    pub fn from_pool(pool: SqlitePool) -> DatabaseConnection {
        DatabaseConnection { connection: pool }
    }

    /// Options shared by every pool: creates the file if needed and enforces foreign keys.
    pub fn connect_options(url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
        Ok(SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true))
    }

    /// Opens the pool for `url`, creating the database file if needed.
    pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
        let options = Self::connect_options(url)?;

        SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
    }

    /// Like [`connect`](Self::connect), but opens connections on first use.
    pub fn connect_lazy(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
        let options = Self::connect_options(url)?;

        Ok(SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy_with(options))
    }

    /// Applies the embedded migrations.
    pub async fn migrate(pool: &SqlitePool) -> Result<(), MigrateError> {
        sqlx::migrate!().run(pool).await?;
        info!("database migrations applied");
        Ok(())
    }

    /// Makes every subsequently injected connection share `pool`.
    pub fn install(pool: SqlitePool) {
        *INSTALLED_POOL.lock().unwrap_or_else(|e| e.into_inner()) = Some(pool);
    }

    pub fn set_test_pool(pool: SqlitePool) {
        Self::install(pool);
    }

    pub fn clear_test_pool() {
        *INSTALLED_POOL.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn installed_pool() -> Option<SqlitePool> {
        INSTALLED_POOL
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Deref for DatabaseConnection {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl DerefMut for DatabaseConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.connection
    }
}
