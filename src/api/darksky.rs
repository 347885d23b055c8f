//! Client for the weather provider's time-machine endpoint.
//!
//! One request covers one day at one coordinate pair and returns the hourly
//! attribute block. Historical and forecast fetches share the endpoint but
//! carry opposite day guards: history is strictly before today, forecasts
//! are today or later.

use crate::error::{AppError, Result};
use crate::models::WeatherResponse;
use chrono::{NaiveDate, NaiveTime};
use reqwest::Client;
use tracing::{debug, error, info};

const BASE_URL: &str = "https://api.darksky.net";

/// An asynchronous client for the weather time-machine API.
pub struct WeatherClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl WeatherClient {
    /// Creates a new `WeatherClient` with the provided API key.
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Creates a new `WeatherClient` against a custom base URL, for tests
    /// running a mock server.
    #[cfg(test)]
    pub fn new_with_base_url(api_key: String, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.to_string(),
        }
    }

    /// Observed weather for a past day. Rejects `day >= today` before any
    /// network I/O.
    pub async fn get_historical_weather(
        &self,
        latitude: f64,
        longitude: f64,
        day: NaiveDate,
    ) -> Result<WeatherResponse> {
        if day >= chrono::Local::now().date_naive() {
            return Err(AppError::Validation(format!(
                "cannot fetch observed weather for {} (not in the past)",
                day
            )));
        }
        self.time_machine(latitude, longitude, day).await
    }

    /// Forecast weather for a day. Rejects `day < today` before any network
    /// I/O.
    pub async fn get_forecast_weather(
        &self,
        latitude: f64,
        longitude: f64,
        day: NaiveDate,
    ) -> Result<WeatherResponse> {
        if day < chrono::Local::now().date_naive() {
            return Err(AppError::Validation(format!(
                "cannot fetch a forecast for past day {}",
                day
            )));
        }
        self.time_machine(latitude, longitude, day).await
    }

    async fn time_machine(
        &self,
        latitude: f64,
        longitude: f64,
        day: NaiveDate,
    ) -> Result<WeatherResponse> {
        // The endpoint addresses a day by the epoch seconds of its midnight.
        let timestamp = day.and_time(NaiveTime::MIN).and_utc().timestamp();
        info!(
            "Fetching weather for ({}, {}) on {}",
            latitude, longitude, day
        );

        let url = format!(
            "{}/forecast/{}/{},{},{}",
            self.base_url, self.api_key, latitude, longitude, timestamp
        );

        let response = self
            .client
            .get(&url)
            .query(&[("units", "si")])
            .send()
            .await
            .map_err(|e| {
                error!("Error fetching weather for {}: {}", day, e);
                AppError::Api(e.into())
            })?;

        let response = response.error_for_status().map_err(|e| {
            error!(
                "Weather API request failed with status {}: {}",
                e.status().unwrap_or_default(),
                e
            );
            AppError::Api(std::sync::Arc::new(e))
        })?;

        let document: WeatherResponse = response.json().await.map_err(|e| {
            error!("Error parsing weather response JSON: {}", e);
            AppError::Api(e.into())
        })?;

        debug!(
            "Received weather document with {} hourly points",
            document.hourly.as_ref().map_or(0, |h| h.data.len())
        );
        Ok(document)
    }
}
