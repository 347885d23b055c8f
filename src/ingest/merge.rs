//! The pure merge rule for weekly bucket documents: replace-on-conflict by
//! dedup key, never duplicate.
//!
//! The store layer applies the merged array back with a compare-and-swap
//! update, so this function sees the full current reading array and returns
//! the full next one.

use crate::models::TimestampedReading;
use chrono::NaiveDateTime;
use std::collections::HashSet;

/// Merges `incoming` readings into `existing`: any existing reading sharing a
/// dedup key with an incoming one is removed, then all incoming readings are
/// appended. Idempotent: merging the same batch twice leaves the same content
/// as merging it once.
pub fn merge_readings(
    existing: Vec<TimestampedReading>,
    incoming: &[TimestampedReading],
) -> Vec<TimestampedReading> {
    let incoming_keys: HashSet<(NaiveDateTime, Option<&str>)> =
        incoming.iter().map(|r| r.dedup_key()).collect();

    let mut merged: Vec<TimestampedReading> = existing
        .into_iter()
        .filter(|reading| !incoming_keys.contains(&reading.dedup_key()))
        .collect();
    merged.extend(incoming.iter().cloned());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MeasurementRecord;
    use chrono::NaiveDate;

    fn dt(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn pollution_reading(day: u32, hour: u32, location: &str, o3: f64) -> TimestampedReading {
        TimestampedReading {
            datetime: dt(day, hour),
            location: Some(location.to_string()),
            measurements: vec![MeasurementRecord::numeric("o3", o3, "µg/m³")],
        }
    }

    fn weather_reading(day: u32, hour: u32, temperature: f64) -> TimestampedReading {
        TimestampedReading {
            datetime: dt(day, hour),
            location: None,
            measurements: vec![MeasurementRecord::numeric("temperature", temperature, "°C")],
        }
    }

    #[test]
    fn merge_is_idempotent() {
        let batch = vec![
            pollution_reading(27, 9, "Magna Grecia", 10.0),
            pollution_reading(27, 10, "Magna Grecia", 12.0),
        ];
        let once = merge_readings(Vec::new(), &batch);
        let twice = merge_readings(once.clone(), &batch);
        assert_eq!(once, twice);
        assert_eq!(twice.len(), 2);
    }

    #[test]
    fn merge_replaces_reading_with_same_dedup_key() {
        let existing = merge_readings(
            Vec::new(),
            &[pollution_reading(27, 9, "Magna Grecia", 10.0)],
        );
        let merged = merge_readings(existing, &[pollution_reading(27, 9, "Magna Grecia", 15.0)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].measurements[0].value.as_numeric(),
            Some(15.0),
            "re-ingestion must replace, not duplicate"
        );
    }

    #[test]
    fn pollution_dedup_key_distinguishes_sensor_locations() {
        let existing = merge_readings(
            Vec::new(),
            &[pollution_reading(27, 9, "Magna Grecia", 10.0)],
        );
        let merged = merge_readings(existing, &[pollution_reading(27, 9, "Cinecitta", 20.0)]);
        assert_eq!(
            merged.len(),
            2,
            "same datetime at a different sensor is a distinct reading"
        );
    }

    #[test]
    fn weather_dedup_key_is_datetime_only() {
        let existing = merge_readings(Vec::new(), &[weather_reading(27, 9, 4.0)]);
        let merged = merge_readings(existing, &[weather_reading(27, 9, 5.5)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].measurements[0].value.as_numeric(), Some(5.5));
    }

    #[test]
    fn untouched_readings_survive_a_merge() {
        let existing = merge_readings(
            Vec::new(),
            &[weather_reading(27, 9, 4.0), weather_reading(27, 10, 5.0)],
        );
        let merged = merge_readings(existing, &[weather_reading(27, 10, 6.0)]);
        assert_eq!(merged.len(), 2);
        let nine = merged.iter().find(|r| r.datetime == dt(27, 9)).unwrap();
        assert_eq!(nine.measurements[0].value.as_numeric(), Some(4.0));
    }
}
