//! Measurement normalizer: converts provider-specific payloads into canonical
//! [`TimestampedReading`] lists.
//!
//! Timezone policy: provider epoch seconds are interpreted with the
//! provider-reported UTC offset when present, otherwise as UTC. The upstream
//! mixed both conventions across revisions; this is the single documented
//! behavior here.

use crate::models::{
    City, CityKey, Coordinates, MeasurementRecord, PollutionRow, RawLocation, TimestampedReading,
    Value, WeatherResponse,
};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Translation table from provider weather attribute names to canonical
/// measurement names. Doubles as a filter: attributes absent from the table
/// are silently dropped.
const WEATHER_NAMES: [(&str, &str); 15] = [
    ("icon", "sky"),
    ("precipIntensity", "precipIntensity"),
    ("precipProbability", "precipProbability"),
    ("apparentTemperature", "apparentTemperature"),
    ("temperature", "temperature"),
    ("dewPoint", "dewPoint"),
    ("humidity", "humidity"),
    ("pressure", "pressure"),
    ("windSpeed", "windSpeed"),
    ("windGust", "windGust"),
    ("windBearing", "windBearing"),
    ("cloudCover", "cloudCover"),
    ("uvIndex", "uvIndex"),
    ("visibility", "visibility"),
    ("ozone", "ozone"),
];

/// Units of the canonical weather measurements.
const WEATHER_UNITS: [(&str, &str); 15] = [
    ("sky", "literal"),
    ("precipIntensity", "mm/h"),
    ("precipProbability", ""),
    ("apparentTemperature", "°C"),
    ("temperature", "°C"),
    ("dewPoint", "°C"),
    ("humidity", "percent"),
    ("pressure", "hPa"),
    ("windSpeed", "m/s"),
    ("windGust", "m/s"),
    ("windBearing", "°"),
    ("cloudCover", "%"),
    ("uvIndex", ""),
    ("visibility", "km"),
    ("ozone", ""),
];

fn canonical_weather_name(provider_name: &str) -> Option<&'static str> {
    WEATHER_NAMES
        .iter()
        .find(|(from, _)| *from == provider_name)
        .map(|(_, to)| *to)
}

fn weather_unit(canonical_name: &str) -> &'static str {
    WEATHER_UNITS
        .iter()
        .find(|(name, _)| *name == canonical_name)
        .map(|(_, unit)| *unit)
        .unwrap_or("")
}

/// Converts one weather document into per-hour readings.
///
/// Produces at most one reading per provider hour; hours whose timestamp
/// cannot be represented are dropped with a warning.
pub fn normalize_weather(response: &WeatherResponse) -> Vec<TimestampedReading> {
    let offset_seconds = response
        .offset
        .map(|hours| (hours * 3600.0) as i32)
        .unwrap_or(0);
    let offset = FixedOffset::east_opt(offset_seconds).unwrap_or_else(|| {
        warn!(
            "Provider reported out-of-range UTC offset {}s, falling back to UTC",
            offset_seconds
        );
        FixedOffset::east_opt(0).expect("zero offset is valid")
    });

    let points = match &response.hourly {
        Some(block) => &block.data,
        None => return Vec::new(),
    };

    points
        .par_iter()
        .filter_map(|point| {
            let datetime = epoch_to_naive(point.time, offset)?;
            let measurements: Vec<MeasurementRecord> = point
                .attributes
                .iter()
                .filter_map(|(attribute, raw)| {
                    let name = canonical_weather_name(attribute)?;
                    let value = json_to_value(raw)?;
                    Some(MeasurementRecord {
                        name: name.to_string(),
                        value,
                        unit: weather_unit(name).to_string(),
                    })
                })
                .collect();
            Some(TimestampedReading {
                datetime,
                location: None,
                measurements,
            })
        })
        .collect()
}

fn epoch_to_naive(epoch_seconds: i64, offset: FixedOffset) -> Option<NaiveDateTime> {
    let utc: DateTime<Utc> = match DateTime::from_timestamp(epoch_seconds, 0) {
        Some(dt) => dt,
        None => {
            warn!("Dropping reading with unrepresentable timestamp {}", epoch_seconds);
            return None;
        }
    };
    Some(utc.with_timezone(&offset).naive_local())
}

fn json_to_value(raw: &serde_json::Value) -> Option<Value> {
    match raw {
        serde_json::Value::Number(n) => n.as_f64().map(Value::Numeric),
        serde_json::Value::String(s) => Some(Value::Categorical(s.clone())),
        _ => None,
    }
}

/// Groups flat per-sensor pollution rows into one reading per
/// `(sensor location, datetime)`, since the bucket schema stores all
/// pollutants of one reading together.
///
/// Output order is deterministic (sorted by location, then datetime).
pub fn normalize_pollution(rows: &[PollutionRow]) -> Vec<TimestampedReading> {
    let mut grouped: BTreeMap<(String, NaiveDateTime), Vec<MeasurementRecord>> = BTreeMap::new();
    for row in rows {
        let datetime = row.date.utc.naive_utc();
        grouped
            .entry((row.location.clone(), datetime))
            .or_default()
            .push(MeasurementRecord::numeric(
                row.parameter.clone(),
                row.value,
                row.unit.clone(),
            ));
    }

    grouped
        .into_iter()
        .map(|((location, datetime), measurements)| TimestampedReading {
            datetime,
            location: Some(location),
            measurements,
        })
        .collect()
}

/// Location directory names that mark unusable entries.
const DISCARDED_LOCATION_NAMES: [&str; 2] = ["N/A", "unused"];

/// Deduplicates directory sites by `(country, city)`, averaging coordinates
/// across sub-locations sharing a city. New cities start disabled and
/// unvoted, awaiting moderation.
pub fn dedup_locations(raw: &[RawLocation]) -> Vec<City> {
    struct CoordsAvg {
        lat_sum: f64,
        lon_sum: f64,
        count: u32,
    }

    let mut by_city: HashMap<CityKey, CoordsAvg> = HashMap::new();
    let mut order: Vec<CityKey> = Vec::new();

    for location in raw {
        if DISCARDED_LOCATION_NAMES.contains(&location.city.as_str())
            || DISCARDED_LOCATION_NAMES.contains(&location.country.as_str())
        {
            continue;
        }
        let key = CityKey::new(location.country.clone(), location.city.clone());
        let entry = by_city.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            CoordsAvg {
                lat_sum: 0.0,
                lon_sum: 0.0,
                count: 0,
            }
        });
        entry.lat_sum += location.coordinates.latitude;
        entry.lon_sum += location.coordinates.longitude;
        entry.count += 1;
    }

    order
        .into_iter()
        .map(|key| {
            let avg = &by_city[&key];
            let coordinates = Coordinates::new(
                avg.lat_sum / avg.count as f64,
                avg.lon_sum / avg.count as f64,
            );
            City {
                key,
                coordinates: Some(coordinates),
                enabled: false,
                vote_count: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HourlyBlock, HourlyPoint, PollutionDate, RawCoordinates};
    use chrono::{NaiveDate, TimeZone};
    use serde_json::json;

    fn hourly_point(time: i64, attributes: serde_json::Value) -> HourlyPoint {
        HourlyPoint {
            time,
            attributes: attributes.as_object().unwrap().clone(),
        }
    }

    fn weather_response(offset: Option<f64>, points: Vec<HourlyPoint>) -> WeatherResponse {
        WeatherResponse {
            timezone: Some("Europe/Rome".to_string()),
            offset,
            hourly: Some(HourlyBlock { data: points }),
        }
    }

    #[test]
    fn weather_unknown_attributes_are_dropped() {
        // 2020-01-27T10:00:00Z
        let response = weather_response(
            None,
            vec![hourly_point(
                1_580_119_200,
                json!({"temperature": 4.5, "summary": "Clear", "icon": "clear-day"}),
            )],
        );
        let readings = normalize_weather(&response);
        assert_eq!(readings.len(), 1);
        let names: Vec<&str> = readings[0]
            .measurements
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert!(names.contains(&"temperature"));
        assert!(names.contains(&"sky"));
        assert!(!names.contains(&"summary"), "untranslated names must be filtered");
    }

    #[test]
    fn weather_sky_is_categorical_with_literal_unit() {
        let response = weather_response(
            None,
            vec![hourly_point(1_580_119_200, json!({"icon": "rain"}))],
        );
        let readings = normalize_weather(&response);
        let sky = &readings[0].measurements[0];
        assert_eq!(sky.name, "sky");
        assert_eq!(sky.value, Value::Categorical("rain".to_string()));
        assert_eq!(sky.unit, "literal");
    }

    #[test]
    fn weather_timestamps_use_provider_offset_when_present() {
        let epoch = 1_580_119_200; // 2020-01-27T10:00:00Z
        let with_offset = weather_response(
            Some(1.0),
            vec![hourly_point(epoch, json!({"temperature": 1.0}))],
        );
        let without_offset =
            weather_response(None, vec![hourly_point(epoch, json!({"temperature": 1.0}))]);

        let local = normalize_weather(&with_offset)[0].datetime;
        let utc = normalize_weather(&without_offset)[0].datetime;

        let day = NaiveDate::from_ymd_opt(2020, 1, 27).unwrap();
        assert_eq!(local, day.and_hms_opt(11, 0, 0).unwrap());
        assert_eq!(utc, day.and_hms_opt(10, 0, 0).unwrap());
    }

    fn pollution_row(location: &str, parameter: &str, value: f64, hour: u32) -> PollutionRow {
        PollutionRow {
            location: location.to_string(),
            parameter: parameter.to_string(),
            value,
            unit: "µg/m³".to_string(),
            date: PollutionDate {
                utc: Utc.with_ymd_and_hms(2020, 1, 27, hour, 0, 0).unwrap(),
                local: None,
            },
        }
    }

    #[test]
    fn pollution_rows_group_by_sensor_and_timestamp() {
        let rows = vec![
            pollution_row("Magna Grecia", "o3", 10.0, 9),
            pollution_row("Magna Grecia", "no2", 20.0, 9),
            pollution_row("Magna Grecia", "o3", 12.0, 10),
            pollution_row("Cinecitta", "o3", 15.0, 9),
        ];
        let readings = normalize_pollution(&rows);
        assert_eq!(readings.len(), 3, "one reading per (location, datetime)");

        let magna_nine = readings
            .iter()
            .find(|r| {
                r.location.as_deref() == Some("Magna Grecia") && r.datetime.format("%H").to_string() == "09"
            })
            .unwrap();
        assert_eq!(magna_nine.measurements.len(), 2, "pollutants stored together");
    }

    #[test]
    fn location_dedup_averages_coordinates() {
        let raw = vec![
            RawLocation {
                country: "IT".to_string(),
                city: "Roma".to_string(),
                coordinates: RawCoordinates {
                    latitude: 41.0,
                    longitude: 12.0,
                },
            },
            RawLocation {
                country: "IT".to_string(),
                city: "Roma".to_string(),
                coordinates: RawCoordinates {
                    latitude: 43.0,
                    longitude: 14.0,
                },
            },
            RawLocation {
                country: "IT".to_string(),
                city: "N/A".to_string(),
                coordinates: RawCoordinates {
                    latitude: 0.0,
                    longitude: 0.0,
                },
            },
        ];
        let cities = dedup_locations(&raw);
        assert_eq!(cities.len(), 1);
        let roma = &cities[0];
        assert_eq!(roma.key, CityKey::new("IT", "Roma"));
        let coords = roma.coordinates.unwrap();
        assert!((coords.latitude - 42.0).abs() < 1e-9);
        assert!((coords.longitude - 13.0).abs() < 1e-9);
        assert!(!roma.enabled, "synced cities await moderation");
    }
}
