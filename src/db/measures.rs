//! Weekly-bucket merge and the query drivers built on the pure aggregation
//! engine.
//!
//! The store performs only bucket selection in SQL (overlap of the week
//! interval with the query window); unwinding, grouping and averaging happen
//! in [`crate::agg`]. Merges go through a compare-and-swap loop on the
//! bucket's `version` column, so concurrent writers to the same (city, week)
//! serialize without store-level locking.

use super::Store;
use crate::agg::{self, BucketSlice};
use crate::error::{AppError, Result};
use crate::ingest::{self, day_bounds, week_period_of_day};
use crate::models::{
    City, CityKey, Granularity, MeasureCollection, MeasureValue, TimestampedReading,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use sqlx::types::Json;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Attempts before a contended merge gives up with a `Conflict`.
const MAX_CAS_RETRIES: u32 = 5;

impl Store {
    /// Merges a batch of readings into the weekly bucket for `(city, day)`.
    ///
    /// Creates the bucket if absent, otherwise replaces any stored reading
    /// sharing a dedup key with an incoming one and appends the batch, as one
    /// atomic update. Re-running the same batch is a no-op on content.
    ///
    /// Validations happen before any I/O: an empty batch short-circuits,
    /// a disabled city or a city without coordinates is rejected.
    pub async fn merge_readings(
        &self,
        collection: MeasureCollection,
        city: &City,
        day: NaiveDate,
        readings: &[TimestampedReading],
    ) -> Result<()> {
        if readings.is_empty() {
            debug!("No readings provided for {}, nothing to merge", city.key);
            return Ok(());
        }
        if !city.enabled {
            return Err(AppError::Validation(format!(
                "cannot ingest into disabled city {}",
                city.key
            )));
        }
        let coordinates = city.coordinates.ok_or_else(|| {
            AppError::Validation(format!("city {} has no coordinates", city.key))
        })?;

        let (period_start, period_end) = week_period_of_day(day);
        let table = collection.table();

        for attempt in 0..MAX_CAS_RETRIES {
            let existing = sqlx::query_as::<_, (Json<Vec<TimestampedReading>>, i64)>(&format!(
                r#"SELECT readings, version FROM {table}
                   WHERE country = $1 AND city = $2 AND period_start = $3"#
            ))
            .bind(city.country())
            .bind(city.city())
            .bind(period_start)
            .fetch_optional(&self.pool)
            .await?;

            match existing {
                None => {
                    // ON CONFLICT DO NOTHING: a racing writer may create the
                    // bucket first, in which case we retry the merge path.
                    let inserted = sqlx::query(&format!(
                        r#"INSERT INTO {table}
                           (country, city, latitude, longitude, period_start, period_end, enabled, readings)
                           VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7)
                           ON CONFLICT (country, city, period_start) DO NOTHING"#
                    ))
                    .bind(city.country())
                    .bind(city.city())
                    .bind(coordinates.latitude)
                    .bind(coordinates.longitude)
                    .bind(period_start)
                    .bind(period_end)
                    .bind(Json(readings))
                    .execute(&self.pool)
                    .await?
                    .rows_affected();

                    if inserted == 1 {
                        info!(
                            "Created {} bucket for {} week of {}",
                            table, city.key, period_start
                        );
                        return Ok(());
                    }
                },
                Some((Json(stored), version)) => {
                    let merged = ingest::merge_readings(stored, readings);
                    let updated = sqlx::query(&format!(
                        r#"UPDATE {table} SET readings = $1, version = version + 1
                           WHERE country = $2 AND city = $3 AND period_start = $4
                             AND version = $5"#
                    ))
                    .bind(Json(&merged))
                    .bind(city.country())
                    .bind(city.city())
                    .bind(period_start)
                    .bind(version)
                    .execute(&self.pool)
                    .await?
                    .rows_affected();

                    if updated == 1 {
                        debug!(
                            "Merged {} readings into {} bucket for {}",
                            readings.len(),
                            table,
                            city.key
                        );
                        return Ok(());
                    }
                },
            }
            warn!(
                "Concurrent update on {} bucket for {}, retrying (attempt {})",
                table,
                city.key,
                attempt + 1
            );
        }

        Err(AppError::Conflict(format!(
            "bucket for {} in {} kept changing under the merge",
            city.key, table
        )))
    }

    /// Pipeline step 1: the buckets whose week interval overlaps
    /// `[start, end]`, optionally restricted to one city.
    async fn buckets_in_window(
        &self,
        collection: MeasureCollection,
        city: Option<&CityKey>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<BucketSlice>> {
        let rows = sqlx::query_as::<_, (String, String, Json<Vec<TimestampedReading>>)>(&format!(
            r#"SELECT country, city, readings FROM {}
               WHERE period_start <= $1 AND period_end >= $2
                 AND ($3::TEXT IS NULL OR (country = $3 AND city = $4))"#,
            collection.table()
        ))
        .bind(end)
        .bind(start)
        .bind(city.map(|c| c.country.as_str()))
        .bind(city.map(|c| c.city.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(country, city, Json(readings))| BucketSlice {
                city: CityKey::new(country, city),
                readings,
            })
            .collect())
    }

    /// Rolls readings of one collection up to the requested granularity over
    /// the inclusive window `[start, end]`.
    ///
    /// An inverted window is a validation error raised before any I/O; an
    /// empty overlap is an empty map.
    pub async fn rollup(
        &self,
        collection: MeasureCollection,
        city: Option<&CityKey>,
        start: NaiveDateTime,
        end: NaiveDateTime,
        granularity: Granularity,
    ) -> Result<HashMap<CityKey, Vec<MeasureValue>>> {
        if start > end {
            return Err(AppError::Validation(format!(
                "invalid time range: {} > {}",
                start, end
            )));
        }
        let buckets = self.buckets_in_window(collection, city, start, end).await?;
        Ok(agg::rollup(&buckets, start, end, granularity))
    }

    /// [`Store::rollup`] over whole calendar days `[start_day, end_day]`.
    pub async fn rollup_days(
        &self,
        collection: MeasureCollection,
        city: Option<&CityKey>,
        start_day: NaiveDate,
        end_day: NaiveDate,
        granularity: Granularity,
    ) -> Result<HashMap<CityKey, Vec<MeasureValue>>> {
        let (start, _) = day_bounds(start_day);
        let (_, end) = day_bounds(end_day);
        self.rollup(collection, city, start, end, granularity).await
    }

    /// Distinct calendar dates carrying at least one reading for the city in
    /// the given collection. Existence only.
    pub async fn available_dates(
        &self,
        collection: MeasureCollection,
        city: &CityKey,
    ) -> Result<HashSet<NaiveDate>> {
        let rows = sqlx::query_as::<_, (Json<Vec<TimestampedReading>>,)>(&format!(
            r#"SELECT readings FROM {} WHERE country = $1 AND city = $2"#,
            collection.table()
        ))
        .bind(&city.country)
        .bind(&city.city)
        .fetch_all(&self.pool)
        .await?;

        let buckets: Vec<BucketSlice> = rows
            .into_iter()
            .map(|(Json(readings),)| BucketSlice {
                city: city.clone(),
                readings,
            })
            .collect();
        Ok(agg::available_dates(&buckets))
    }

    /// Relative error of the forecast weather against the observed weather,
    /// per day over `[start_day, end_day]`.
    pub async fn reliability(
        &self,
        city: Option<&CityKey>,
        start_day: NaiveDate,
        end_day: NaiveDate,
    ) -> Result<Vec<MeasureValue>> {
        let observed = self
            .rollup_days(
                MeasureCollection::PastWeather,
                city,
                start_day,
                end_day,
                Granularity::Daily,
            )
            .await?;
        let forecast = self
            .rollup_days(
                MeasureCollection::ForecastWeather,
                city,
                start_day,
                end_day,
                Granularity::Daily,
            )
            .await?;
        Ok(agg::reliability(&observed, &forecast))
    }

    /// Derived pollutant forecast over `[start_day, end_day]`, from the last
    /// ~24h of observed pollution and the daily forecast humidity.
    pub async fn pollutant_forecast(
        &self,
        city: Option<&CityKey>,
        start_day: NaiveDate,
        end_day: NaiveDate,
    ) -> Result<Vec<MeasureValue>> {
        if start_day > end_day {
            return Err(AppError::Validation(format!(
                "invalid day range: {} > {}",
                start_day, end_day
            )));
        }
        let now = chrono::Local::now().naive_local();
        let recent_pollution = self
            .rollup(
                MeasureCollection::Pollution,
                city,
                now - Duration::days(1),
                now,
                Granularity::Daily,
            )
            .await?;
        let forecast_weather = self
            .rollup_days(
                MeasureCollection::ForecastWeather,
                city,
                start_day,
                end_day,
                Granularity::Daily,
            )
            .await?;
        Ok(agg::pollutant_forecast(
            &recent_pollution,
            &forecast_weather,
            start_day,
            end_day,
            now.date(),
        ))
    }
}
