//! Connection pool and schema lifecycle for the PostgreSQL store.
//!
//! One table per logical collection: three weekly-bucket measure tables
//! (`pollution`, `past_weather`, `forecast_weather`), the `locations`
//! directory and `users`. Schema creation is idempotent.

use crate::error::{AppError, Result};
use crate::models::MeasureCollection;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, Row};
use tracing::{debug, error, info};

/// The database connection pool and every store operation.
pub struct Store {
    pub(crate) pool: Pool<Postgres>,
}

impl Store {
    /// Establishes a connection pool against `database_url`.
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| {
                error!("Failed to connect to database: {}", e);
                AppError::Db(e.into())
            })?;

        info!("Connected to database successfully");
        Ok(Self { pool })
    }

    #[cfg(all(test, feature = "integration-tests"))]
    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Creates all tables and indexes if they do not exist yet. Safe to run
    /// repeatedly.
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema (if necessary)...");

        // One bucket table per measurement collection. `readings` holds the
        // reading array of the week document; `version` is the optimistic
        // concurrency token guarding merges.
        for collection in MeasureCollection::ALL {
            let table = collection.table();
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id BIGSERIAL PRIMARY KEY,
                    country TEXT NOT NULL,
                    city TEXT NOT NULL,
                    latitude DOUBLE PRECISION,
                    longitude DOUBLE PRECISION,
                    period_start TIMESTAMP NOT NULL,
                    period_end TIMESTAMP NOT NULL,
                    enabled BOOLEAN NOT NULL DEFAULT TRUE,
                    readings JSONB NOT NULL DEFAULT '[]'::jsonb,
                    version BIGINT NOT NULL DEFAULT 0,
                    UNIQUE (country, city, period_start)
                )
                "#
            ))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to create {} table: {}", table, e);
                AppError::Db(e.into())
            })?;

            sqlx::query(&format!(
                r#"CREATE INDEX IF NOT EXISTS idx_{table}_bucket
                   ON {table}(country, city, period_start, period_end)"#
            ))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to create {} bucket index: {}", table, e);
                AppError::Db(e.into())
            })?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS locations (
                country TEXT NOT NULL,
                city TEXT NOT NULL,
                latitude DOUBLE PRECISION,
                longitude DOUBLE PRECISION,
                enabled BOOLEAN NOT NULL DEFAULT FALSE,
                votes TEXT[] NOT NULL DEFAULT '{}',
                UNIQUE (country, city)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create locations table: {}", e);
            AppError::Db(e.into())
        })?;

        // Search is case-insensitive while storage stays case-preserving.
        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_locations_country_ci ON locations(LOWER(country))"#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create locations country index: {}", e);
            AppError::Db(e.into())
        })?;
        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_locations_city_ci ON locations(LOWER(city))"#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create locations city index: {}", e);
            AppError::Db(e.into())
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password TEXT NOT NULL,
                name TEXT NOT NULL,
                surname TEXT NOT NULL,
                status SMALLINT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create users table: {}", e);
            AppError::Db(e.into())
        })?;

        info!("Database schema initialized successfully");
        Ok(())
    }

    /// Drops every collection. Full reset, no undo.
    pub async fn drop_all(&self) -> Result<()> {
        info!("Dropping all collections...");
        for collection in MeasureCollection::ALL {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", collection.table()))
                .execute(&self.pool)
                .await?;
        }
        sqlx::query("DROP TABLE IF EXISTS locations")
            .execute(&self.pool)
            .await?;
        sqlx::query("DROP TABLE IF EXISTS users")
            .execute(&self.pool)
            .await?;
        info!("All collections dropped");
        Ok(())
    }

    /// Whether the schema has been initialized, judged by the presence of the
    /// `locations` table.
    pub async fn is_schema_initialized(&self) -> Result<bool> {
        debug!("Checking if database schema is initialized...");
        let query = "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_schema = 'public' AND table_name = 'locations')";
        let result = sqlx::query(query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to check schema existence: {}", e);
                AppError::Db(e.into())
            })?;
        let initialized = result.try_get::<bool, _>(0).unwrap_or(false);
        debug!("Schema initialized status: {}", initialized);
        Ok(initialized)
    }
}
