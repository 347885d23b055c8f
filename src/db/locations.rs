//! Location directory operations: sync from the upstream directory, search,
//! voting and the enable/disable moderation action.
//!
//! Votes are a username array on the location row; a city's vote count is
//! derived from it by query and never stored. Enabling or disabling a city
//! cascades the flag to all three measure collections in one transaction.

use super::Store;
use crate::error::{AppError, Result};
use crate::models::{City, CityKey, Coordinates, MeasureCollection, User, UserStatus};
use tracing::{debug, info, warn};

type CityRow = (String, String, Option<f64>, Option<f64>, bool, Option<i64>);

fn city_from_row((country, city, latitude, longitude, enabled, vote_count): CityRow) -> City {
    let coordinates = match (latitude, longitude) {
        (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
        _ => None,
    };
    City {
        key: CityKey::new(country, city),
        coordinates,
        enabled,
        vote_count,
    }
}

const CITY_COLUMNS: &str = "country, city, latitude, longitude, enabled, NULL::BIGINT";

impl Store {
    /// Inserts directory cities that are not present yet. Existing cities are
    /// left untouched. Returns the number of newly inserted locations.
    pub async fn sync_locations(&self, cities: &[City]) -> Result<u64> {
        info!("Syncing {} directory cities into locations...", cities.len());
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for city in cities {
            inserted += sqlx::query(
                r#"INSERT INTO locations (country, city, latitude, longitude, enabled)
                   VALUES ($1, $2, $3, $4, $5)
                   ON CONFLICT (country, city) DO NOTHING"#,
            )
            .bind(city.country())
            .bind(city.city())
            .bind(city.coordinates.map(|c| c.latitude))
            .bind(city.coordinates.map(|c| c.longitude))
            .bind(city.enabled)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;
        info!("Location sync complete, {} new cities", inserted);
        Ok(inserted)
    }

    /// Wipes the directory and reloads it from scratch. Destructive; callers
    /// confirm interactively before invoking this.
    pub async fn reset_locations(&self, cities: &[City]) -> Result<()> {
        warn!("Resetting locations collection ({} cities)...", cities.len());
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM locations").execute(&mut *tx).await?;
        for city in cities {
            sqlx::query(
                r#"INSERT INTO locations (country, city, latitude, longitude, enabled)
                   VALUES ($1, $2, $3, $4, $5)"#,
            )
            .bind(city.country())
            .bind(city.city())
            .bind(city.coordinates.map(|c| c.latitude))
            .bind(city.coordinates.map(|c| c.longitude))
            .bind(city.enabled)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        info!("Locations collection reset");
        Ok(())
    }

    /// All cities the viewer may see: admins see the whole directory, other
    /// users only enabled cities.
    pub async fn get_locations(&self, viewer: &User) -> Result<Vec<City>> {
        let rows = sqlx::query_as::<_, CityRow>(&format!(
            r#"SELECT {CITY_COLUMNS} FROM locations
               WHERE $1 OR enabled = TRUE
               ORDER BY country, city"#
        ))
        .bind(viewer.status == UserStatus::Admin)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(city_from_row).collect())
    }

    /// Cities filtered by their enabled flag.
    pub async fn get_cities_by_status(&self, enabled: bool) -> Result<Vec<City>> {
        let rows = sqlx::query_as::<_, CityRow>(&format!(
            r#"SELECT {CITY_COLUMNS} FROM locations WHERE enabled = $1 ORDER BY country, city"#
        ))
        .bind(enabled)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(city_from_row).collect())
    }

    /// Case-insensitive exact search by country and/or city name. Non-admin
    /// viewers only see enabled cities. No match is an empty list.
    pub async fn search_locations(
        &self,
        viewer: &User,
        country: Option<&str>,
        city: Option<&str>,
    ) -> Result<Vec<City>> {
        let rows = sqlx::query_as::<_, CityRow>(&format!(
            r#"SELECT {CITY_COLUMNS} FROM locations
               WHERE ($1::TEXT IS NULL OR LOWER(country) = LOWER($1))
                 AND ($2::TEXT IS NULL OR LOWER(city) = LOWER($2))
                 AND ($3 OR enabled = TRUE)
               ORDER BY country, city"#
        ))
        .bind(country)
        .bind(city)
        .bind(viewer.status == UserStatus::Admin)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(city_from_row).collect())
    }

    /// The `n` most voted disabled cities, vote counts included. Candidates
    /// for enabling, ranked by popular demand.
    pub async fn top_locations_by_votes(&self, n: i64) -> Result<Vec<City>> {
        let rows = sqlx::query_as::<_, CityRow>(
            r#"SELECT country, city, latitude, longitude, enabled,
                      CARDINALITY(votes)::BIGINT AS vote_count
               FROM locations
               WHERE enabled = FALSE
               ORDER BY CARDINALITY(votes) DESC, country, city
               LIMIT $1"#,
        )
        .bind(n)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(city_from_row).collect())
    }

    /// Records the user's vote for a city. Add-to-set semantics: voting twice
    /// for the same city, or for an unknown city, is a `Conflict`.
    pub async fn vote_location(&self, user: &User, key: &CityKey) -> Result<()> {
        let updated = sqlx::query(
            r#"UPDATE locations SET votes = ARRAY_APPEND(votes, $1)
               WHERE country = $2 AND city = $3 AND NOT ($1 = ANY(votes))"#,
        )
        .bind(&user.username)
        .bind(&key.country)
        .bind(&key.city)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::Conflict(format!(
                "{} has already voted for {} (or the city is unknown)",
                user.username, key
            )));
        }
        debug!("{} voted for {}", user.username, key);
        Ok(())
    }

    /// Withdraws the user's vote. Removing an absent vote is a `Conflict`.
    pub async fn unvote_location(&self, user: &User, key: &CityKey) -> Result<()> {
        let updated = sqlx::query(
            r#"UPDATE locations SET votes = ARRAY_REMOVE(votes, $1)
               WHERE country = $2 AND city = $3 AND $1 = ANY(votes)"#,
        )
        .bind(&user.username)
        .bind(&key.country)
        .bind(&key.city)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::Conflict(format!(
                "{} has no vote on {} to withdraw",
                user.username, key
            )));
        }
        debug!("{} withdrew the vote for {}", user.username, key);
        Ok(())
    }

    /// Moderation action: flips the city's enabled flag and cascades it to
    /// every measurement bucket of the city, in one transaction.
    pub async fn set_city_enabled(&self, key: &CityKey, enabled: bool) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"UPDATE locations SET enabled = $1 WHERE country = $2 AND city = $3"#,
        )
        .bind(enabled)
        .bind(&key.country)
        .bind(&key.city)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::Validation(format!("unknown city {}", key)));
        }

        for collection in MeasureCollection::ALL {
            sqlx::query(&format!(
                r#"UPDATE {} SET enabled = $1 WHERE country = $2 AND city = $3"#,
                collection.table()
            ))
            .bind(enabled)
            .bind(&key.country)
            .bind(&key.city)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            "City {} {}",
            key,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }
}
