//! Multi-stage rollup over weekly bucket documents.
//!
//! Pipeline shape (after the store has selected overlapping buckets):
//! unwind the per-bucket reading array, filter readings to the requested
//! window, unwind each reading's measurement array, truncate timestamps to
//! the requested granularity, group by (city, country, time unit, name,
//! unit), then reduce each group to a single value: arithmetic mean for
//! numeric measurements, most-frequent value for the categorical sky
//! condition (ties broken by first-encountered value).

use crate::models::{CityKey, Granularity, MeasureValue, TimestampedReading, Value};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap, HashSet};

/// The slice of a weekly bucket document the aggregation engine consumes:
/// the owning city plus the unwound reading array.
#[derive(Debug, Clone)]
pub struct BucketSlice {
    pub city: CityKey,
    pub readings: Vec<TimestampedReading>,
}

/// Group identity for one rollup cell. Ordered so results come out in a
/// stable (city, time, name) order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    country: String,
    city: String,
    datetime: NaiveDateTime,
    name: String,
    unit: String,
}

#[derive(Debug, Default)]
struct GroupAcc {
    sum: f64,
    count: u32,
    /// Categorical samples in encounter order, for the mode computation.
    categorical: Vec<String>,
}

/// Rolls raw readings up to the requested granularity over the inclusive
/// window `[start, end]`.
///
/// Cities with no matching readings are absent from the returned map, never
/// present with an empty list; an empty overlap therefore yields an empty
/// map. Callers validate `start <= end` before fetching buckets (see
/// [`crate::db::Store::rollup`]).
pub fn rollup(
    buckets: &[BucketSlice],
    start: NaiveDateTime,
    end: NaiveDateTime,
    granularity: Granularity,
) -> HashMap<CityKey, Vec<MeasureValue>> {
    let mut groups: BTreeMap<GroupKey, GroupAcc> = BTreeMap::new();

    for bucket in buckets {
        for reading in &bucket.readings {
            if reading.datetime < start || reading.datetime > end {
                continue;
            }
            for measurement in &reading.measurements {
                let key = GroupKey {
                    country: bucket.city.country.clone(),
                    city: bucket.city.city.clone(),
                    datetime: granularity.truncate(reading.datetime),
                    name: measurement.name.clone(),
                    unit: measurement.unit.clone(),
                };
                let acc = groups.entry(key).or_default();
                match &measurement.value {
                    Value::Numeric(v) => {
                        acc.sum += v;
                        acc.count += 1;
                    }
                    Value::Categorical(s) => acc.categorical.push(s.clone()),
                }
            }
        }
    }

    let mut result: HashMap<CityKey, Vec<MeasureValue>> = HashMap::new();
    for (key, acc) in groups {
        let value = if acc.count > 0 {
            Value::Numeric(acc.sum / acc.count as f64)
        } else {
            match mode_first_seen(&acc.categorical) {
                Some(winner) => Value::Categorical(winner.to_string()),
                None => continue,
            }
        };
        let city = CityKey::new(key.country, key.city);
        result.entry(city.clone()).or_default().push(MeasureValue {
            city,
            datetime: key.datetime,
            name: key.name,
            value,
            unit: key.unit,
        });
    }
    result
}

/// Most frequent sample; on a tie the value encountered first wins. The
/// first-seen rule is part of the contract, not a lexicographic or
/// last-seen choice.
fn mode_first_seen(samples: &[String]) -> Option<&str> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for sample in samples {
        *counts.entry(sample.as_str()).or_insert(0) += 1;
    }
    let best = counts.values().copied().max()?;
    samples
        .iter()
        .find(|sample| counts[sample.as_str()] == best)
        .map(|s| s.as_str())
}

/// The distinct calendar dates for which at least one reading exists in the
/// given buckets. Existence only, no aggregation.
pub fn available_dates(buckets: &[BucketSlice]) -> HashSet<NaiveDate> {
    buckets
        .iter()
        .flat_map(|bucket| bucket.readings.iter())
        .map(|reading| reading.datetime.date())
        .collect()
}
