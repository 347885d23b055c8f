//! Deserialization structs for the upstream provider payloads.
//!
//! The weather provider returns a forecast/time-machine document with an
//! hourly block of loosely-typed attributes; the pollution provider returns a
//! flat list of per-sensor readings plus a paged location directory. These
//! structs stay close to the wire format — canonicalization happens in
//! [`crate::ingest`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Weather provider (time-machine endpoint) ---

/// Top-level weather document for one day at one coordinate pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherResponse {
    /// IANA timezone name reported by the provider (informational).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// UTC offset in hours reported by the provider for the location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly: Option<HourlyBlock>,
}

/// The hourly data block of a weather document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyBlock {
    pub data: Vec<HourlyPoint>,
}

/// One hour of weather attributes.
///
/// Attribute names and value types vary by provider revision, so everything
/// except the timestamp is kept as raw JSON; the normalizer's translation
/// table decides what survives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyPoint {
    /// Epoch seconds.
    pub time: i64,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

// --- Pollution provider ---

/// Response envelope of the pollution measurements endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollutionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
    pub results: Vec<PollutionRow>,
}

/// One flat per-sensor reading: a single pollutant at a single timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollutionRow {
    /// Sensor location name within the city.
    pub location: String,
    /// Pollutant name (`o3`, `no2`, `pm10`, ...).
    pub parameter: String,
    pub value: f64,
    pub unit: String,
    pub date: PollutionDate,
}

/// Timestamp pair attached to a pollution reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollutionDate {
    pub utc: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
}

// --- Location directory ---

/// Response envelope of the paged locations endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationsResponse {
    pub meta: PageMeta,
    pub results: Vec<RawLocation>,
}

/// Paging metadata shared by the provider's list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found: Option<u32>,
}

/// One sensor site from the location directory. Several sites may share a
/// city; the normalizer deduplicates them into a single city centroid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLocation {
    pub country: String,
    pub city: String,
    pub coordinates: RawCoordinates,
}

/// Wire-format coordinates of a sensor site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}
