//! The measurement value model shared by ingestion, storage and aggregation.
//!
//! A weekly bucket document holds one [`TimestampedReading`] per (datetime[,
//! sensor location]); each reading carries the canonical `{name, value, unit}`
//! triples produced by the normalizer. Aggregation queries flatten those into
//! [`MeasureValue`] records.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A measurement value: numeric for physical quantities, categorical for the
/// "sky condition" class.
///
/// Serialized untagged so it round-trips the provider JSON and the JSONB
/// bucket payload as a plain number or string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Numeric(f64),
    Categorical(String),
}

impl Value {
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Numeric(v) => Some(*v),
            Value::Categorical(_) => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Value::Numeric(_) => None,
            Value::Categorical(s) => Some(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Numeric(v) => write!(f, "{}", v),
            Value::Categorical(s) => write!(f, "{}", s),
        }
    }
}

/// One canonical measurement: `{name, value, unit}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub name: String,
    pub value: Value,
    pub unit: String,
}

impl MeasurementRecord {
    pub fn numeric(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Value::Numeric(value),
            unit: unit.into(),
        }
    }

    pub fn categorical(
        name: impl Into<String>,
        value: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: Value::Categorical(value.into()),
            unit: unit.into(),
        }
    }
}

/// The atomic unit of ingestion and deduplication.
///
/// Within one bucket document no two readings may share the dedup key:
/// `(datetime)` for weather readings, `(datetime, location)` for pollution
/// readings (weather readings simply carry no sensor location).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedReading {
    pub datetime: NaiveDateTime,
    /// Sensor location, present for pollution readings only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub measurements: Vec<MeasurementRecord>,
}

impl TimestampedReading {
    /// The key that must never repeat within one bucket's reading array.
    pub fn dedup_key(&self) -> (NaiveDateTime, Option<&str>) {
        (self.datetime, self.location.as_deref())
    }
}

/// The flattened unit of all aggregation outputs; ephemeral, constructed per
/// query.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureValue {
    pub city: super::CityKey,
    pub datetime: NaiveDateTime,
    pub name: String,
    pub value: Value,
    pub unit: String,
}

impl fmt::Display for MeasureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} at {}) {}: {} {}",
            self.datetime, self.city, self.name, self.value, self.unit
        )
    }
}

/// The three logical measurement collections, each backed by its own bucket
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MeasureCollection {
    Pollution,
    PastWeather,
    ForecastWeather,
}

impl MeasureCollection {
    pub const ALL: [MeasureCollection; 3] = [
        MeasureCollection::Pollution,
        MeasureCollection::PastWeather,
        MeasureCollection::ForecastWeather,
    ];

    /// Backing table name. A fixed set, safe to splice into SQL.
    pub fn table(&self) -> &'static str {
        match self {
            MeasureCollection::Pollution => "pollution",
            MeasureCollection::PastWeather => "past_weather",
            MeasureCollection::ForecastWeather => "forecast_weather",
        }
    }
}

impl fmt::Display for MeasureCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

/// Rollup granularity: the time unit raw readings are grouped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Granularity {
    Hourly,
    Daily,
}

impl Granularity {
    /// Truncate a timestamp to its time-unit key: `Daily` keeps
    /// (year, month, day), `Hourly` keeps (year, month, day, hour).
    pub fn truncate(&self, datetime: NaiveDateTime) -> NaiveDateTime {
        match self {
            Granularity::Daily => datetime.date().and_hms_opt(0, 0, 0),
            Granularity::Hourly => datetime.date().and_hms_opt(datetime.hour(), 0, 0),
        }
        .expect("truncated time components are always in range")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn value_deserializes_untagged() {
        let numeric: Value = serde_json::from_str("10.5").unwrap();
        assert_eq!(numeric, Value::Numeric(10.5));
        let integer: Value = serde_json::from_str("3").unwrap();
        assert_eq!(integer, Value::Numeric(3.0));
        let sky: Value = serde_json::from_str("\"partly-cloudy-day\"").unwrap();
        assert_eq!(sky, Value::Categorical("partly-cloudy-day".to_string()));
    }

    #[test]
    fn reading_roundtrips_without_location_field_for_weather() {
        let reading = TimestampedReading {
            datetime: dt(2020, 1, 27, 10, 0, 0),
            location: None,
            measurements: vec![MeasurementRecord::numeric("temperature", 4.2, "°C")],
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert!(json.get("location").is_none());
        let back: TimestampedReading = serde_json::from_value(json).unwrap();
        assert_eq!(back, reading);
    }

    #[test]
    fn truncation_drops_sub_unit_components() {
        let t = dt(2020, 1, 27, 13, 45, 59);
        assert_eq!(Granularity::Hourly.truncate(t), dt(2020, 1, 27, 13, 0, 0));
        assert_eq!(Granularity::Daily.truncate(t), dt(2020, 1, 27, 0, 0, 0));
    }
}
