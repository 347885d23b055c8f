//! Random data provider used when a provider key is missing or a fetch
//! fails, and for tests that need data without hitting the network.
//!
//! Shapes match the real provider payloads so the normalizer treats mock and
//! live data identically.

use crate::models::{
    HourlyBlock, HourlyPoint, PollutionDate, PollutionRow, WeatherResponse,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rand::{thread_rng, Rng};
use tracing::debug;

const SKY_CONDITIONS: [&str; 6] = [
    "clear-day",
    "partly-cloudy-day",
    "cloudy",
    "rain",
    "fog",
    "wind",
];

const POLLUTANTS: [&str; 5] = ["o3", "no2", "pm10", "pm25", "co"];

/// Generates plausible weather documents and pollution readings.
pub struct MockDataProvider;

impl MockDataProvider {
    pub fn new() -> Self {
        debug!("Creating MockDataProvider");
        Self
    }

    /// A full 24-hour weather document for the given day, shaped like the
    /// time-machine response.
    pub fn get_weather(&self, day: NaiveDate) -> WeatherResponse {
        let mut rng = thread_rng();
        let midnight = day.and_time(NaiveTime::MIN).and_utc().timestamp();

        let data = (0..24)
            .map(|hour| {
                let mut attributes = serde_json::Map::new();
                attributes.insert("temperature".into(), round2(rng.gen_range(-5.0..30.0)).into());
                attributes.insert(
                    "apparentTemperature".into(),
                    round2(rng.gen_range(-8.0..32.0)).into(),
                );
                attributes.insert("humidity".into(), round2(rng.gen_range(0.05..0.95)).into());
                attributes.insert("pressure".into(), round2(rng.gen_range(990.0..1035.0)).into());
                attributes.insert("windSpeed".into(), round2(rng.gen_range(0.0..20.0)).into());
                attributes.insert("cloudCover".into(), round2(rng.gen_range(0.0..1.0)).into());
                attributes.insert(
                    "icon".into(),
                    SKY_CONDITIONS[rng.gen_range(0..SKY_CONDITIONS.len())].into(),
                );
                HourlyPoint {
                    time: midnight + hour * 3600,
                    attributes,
                }
            })
            .collect();

        WeatherResponse {
            timezone: Some("Etc/UTC".to_string()),
            offset: Some(0.0),
            hourly: Some(HourlyBlock { data }),
        }
    }

    /// Hourly per-sensor pollutant rows over `[from, to]`, shaped like the
    /// measurements response.
    pub fn get_pollution_measurements(
        &self,
        city: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Vec<PollutionRow> {
        let mut rng = thread_rng();
        let locations = [format!("{} Station 1", city), format!("{} Station 2", city)];

        let mut rows = Vec::new();
        let mut at = from;
        while at <= to {
            for location in &locations {
                for pollutant in POLLUTANTS {
                    rows.push(PollutionRow {
                        location: location.clone(),
                        parameter: pollutant.to_string(),
                        value: round2(rng.gen_range(1.0..120.0)),
                        unit: "µg/m³".to_string(),
                        date: PollutionDate {
                            utc: Utc.from_utc_datetime(&at),
                            local: None,
                        },
                    });
                }
            }
            at += chrono::Duration::hours(1);
        }
        debug!("Generated {} mock pollution rows for {}", rows.len(), city);
        rows
    }
}

impl Default for MockDataProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest;

    #[test]
    fn mock_weather_normalizes_like_live_data() {
        let provider = MockDataProvider::new();
        let day = NaiveDate::from_ymd_opt(2020, 1, 27).unwrap();
        let readings = ingest::normalize_weather(&provider.get_weather(day));

        assert_eq!(readings.len(), 24);
        assert!(readings.iter().all(|r| r.datetime.date() == day));
        assert!(readings
            .iter()
            .all(|r| r.measurements.iter().any(|m| m.name == "sky")));
    }

    #[test]
    fn mock_pollution_covers_the_window() {
        let provider = MockDataProvider::new();
        let day = NaiveDate::from_ymd_opt(2020, 1, 27).unwrap();
        let from = day.and_hms_opt(0, 0, 0).unwrap();
        let to = day.and_hms_opt(23, 0, 0).unwrap();
        let rows = provider.get_pollution_measurements("Roma", from, to);

        // 24 hours, 2 stations, 5 pollutants each.
        assert_eq!(rows.len(), 24 * 2 * POLLUTANTS.len());
        let readings = ingest::normalize_pollution(&rows);
        assert_eq!(readings.len(), 24 * 2, "one reading per (station, hour)");
    }
}
