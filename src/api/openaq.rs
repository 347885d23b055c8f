//! Client for the pollution provider: per-city measurements and the paged
//! location directory.

use crate::error::{AppError, Result};
use crate::models::{LocationsResponse, PollutionResponse, PollutionRow, RawLocation};
use chrono::NaiveDateTime;
use reqwest::Client;
use tracing::{debug, error, info};

const BASE_URL: &str = "https://api.openaq.org/v1";
/// Page size for both endpoints; the directory pages until `meta.found` is
/// exhausted.
const PAGE_LIMIT: u32 = 10_000;

/// An asynchronous client for the pollution measurements API.
pub struct PollutionClient {
    client: Client,
    base_url: String,
}

impl PollutionClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Creates a new `PollutionClient` against a custom base URL, for tests
    /// running a mock server.
    #[cfg(test)]
    pub fn new_with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    /// Flat per-sensor pollutant readings for one city in a time window.
    pub async fn get_pollution_measurements(
        &self,
        country: &str,
        city: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<PollutionRow>> {
        info!(
            "Fetching pollution measurements for {},{} from {} to {}",
            city, country, from, to
        );

        let url = format!("{}/measurements", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("country", country.to_string()),
                ("city", city.to_string()),
                ("date_from", format_datetime(from)),
                ("date_to", format_datetime(to)),
                ("limit", PAGE_LIMIT.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                error!("Error fetching pollution for {},{}: {}", city, country, e);
                AppError::Api(e.into())
            })?
            .error_for_status()
            .map_err(|e| {
                error!(
                    "Pollution API request failed with status {}: {}",
                    e.status().unwrap_or_default(),
                    e
                );
                AppError::Api(std::sync::Arc::new(e))
            })?;

        let parsed: PollutionResponse = response.json().await.map_err(|e| {
            error!("Error parsing pollution response JSON: {}", e);
            AppError::Api(e.into())
        })?;

        debug!(
            "Received {} pollution rows for {},{}",
            parsed.results.len(),
            city,
            country
        );
        Ok(parsed.results)
    }

    /// The full location directory, following `meta.found` across pages.
    pub async fn get_all_locations(&self) -> Result<Vec<RawLocation>> {
        info!("Fetching the location directory...");

        let first = self.locations_page(1).await?;
        let mut results = first.results;

        // The server reports the effective page size; trust it over our
        // requested limit when computing the page count.
        let limit = first.meta.limit.max(1);
        let found = first.meta.found.unwrap_or(results.len() as u32);
        let pages = (found + limit - 1) / limit;

        for page in 2..=pages {
            let mut next = self.locations_page(page).await?;
            results.append(&mut next.results);
        }

        info!("Location directory holds {} sites", results.len());
        Ok(results)
    }

    async fn locations_page(&self, page: u32) -> Result<LocationsResponse> {
        let url = format!("{}/locations", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("page", page.to_string()), ("limit", PAGE_LIMIT.to_string())])
            .send()
            .await
            .map_err(|e| {
                error!("Error fetching locations page {}: {}", page, e);
                AppError::Api(e.into())
            })?
            .error_for_status()
            .map_err(|e| {
                error!(
                    "Locations API request failed with status {}: {}",
                    e.status().unwrap_or_default(),
                    e
                );
                AppError::Api(std::sync::Arc::new(e))
            })?;

        response.json().await.map_err(|e| {
            error!("Error parsing locations page {} JSON: {}", page, e);
            AppError::Api(e.into())
        })
    }
}

impl Default for PollutionClient {
    fn default() -> Self {
        Self::new()
    }
}

fn format_datetime(datetime: NaiveDateTime) -> String {
    datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mockito::Matcher;

    #[tokio::test]
    async fn measurements_fetch_parses_rows() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{
            "meta": {"page": 1, "limit": 10000, "found": 2},
            "results": [
                {"location": "Magna Grecia", "parameter": "o3", "value": 10.0,
                 "unit": "µg/m³", "date": {"utc": "2020-01-27T09:00:00Z", "local": "2020-01-27T10:00:00+01:00"}},
                {"location": "Cinecitta", "parameter": "no2", "value": 22.5,
                 "unit": "µg/m³", "date": {"utc": "2020-01-27T09:00:00Z"}}
            ]
        }"#;
        let mock = server
            .mock("GET", "/measurements")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("country".into(), "IT".into()),
                Matcher::UrlEncoded("city".into(), "Roma".into()),
                Matcher::UrlEncoded("date_from".into(), "2020-01-27T00:00:00.000Z".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let client = PollutionClient::new_with_base_url(&server.url());
        let day = NaiveDate::from_ymd_opt(2020, 1, 27).unwrap();
        let rows = client
            .get_pollution_measurements(
                "IT",
                "Roma",
                day.and_hms_opt(0, 0, 0).unwrap(),
                day.and_hms_opt(23, 59, 59).unwrap(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].location, "Magna Grecia");
        assert_eq!(rows[0].parameter, "o3");
        assert_eq!(rows[1].value, 22.5);
    }

    #[tokio::test]
    async fn measurement_error_status_maps_to_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let client = PollutionClient::new_with_base_url(&server.url());
        let day = NaiveDate::from_ymd_opt(2020, 1, 27).unwrap();
        let err = client
            .get_pollution_measurements(
                "IT",
                "Roma",
                day.and_hms_opt(0, 0, 0).unwrap(),
                day.and_hms_opt(23, 59, 59).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Api(_)));
    }

    #[tokio::test]
    async fn location_directory_follows_pages() {
        let mut server = mockito::Server::new_async().await;
        let page1 = r#"{
            "meta": {"page": 1, "limit": 2, "found": 3},
            "results": [
                {"country": "IT", "city": "Roma", "coordinates": {"latitude": 41.9, "longitude": 12.5}},
                {"country": "IT", "city": "Milano", "coordinates": {"latitude": 45.5, "longitude": 9.2}}
            ]
        }"#;
        let page2 = r#"{
            "meta": {"page": 2, "limit": 2, "found": 3},
            "results": [
                {"country": "FR", "city": "Paris", "coordinates": {"latitude": 48.9, "longitude": 2.3}}
            ]
        }"#;
        let first = server
            .mock("GET", "/locations")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(page1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/locations")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(page2)
            .create_async()
            .await;

        let client = PollutionClient::new_with_base_url(&server.url());
        let sites = client.get_all_locations().await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(sites.len(), 3);
        assert_eq!(sites[2].city, "Paris");
    }
}
