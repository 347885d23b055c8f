//! Cross-series reconciliation: joining two rollup result sets by
//! `(city, timestamp, measurement name)` to derive relative error, and the
//! pollutant forecast heuristic built on a pollution baseline and forecast
//! humidity.

use crate::models::{CityKey, MeasureValue, Value};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;

/// Pollutants the forecast heuristic applies to. Other measurement names in
/// the baseline are ignored.
pub const FORECASTABLE_POLLUTANTS: [&str; 7] = ["o3", "no2", "pm10", "pm25", "so2", "co", "bc"];

type SeriesKey = (CityKey, NaiveDateTime, String);

fn index_by_key(series: &HashMap<CityKey, Vec<MeasureValue>>) -> HashMap<SeriesKey, &MeasureValue> {
    series
        .values()
        .flatten()
        .map(|m| ((m.city.clone(), m.datetime, m.name.clone()), m))
        .collect()
}

/// Relative error of a forecast series against the observed series.
///
/// For every forecast entry with a numeric observed counterpart at the same
/// `(city, timestamp, name)`, emits `(observed - forecast) / observed` with
/// unit `"%"`. Unmatched entries and categorical values (the sky condition)
/// are skipped, never zero-filled. Output is sorted by (city, timestamp,
/// name) so callers see a stable order.
pub fn reliability(
    observed: &HashMap<CityKey, Vec<MeasureValue>>,
    forecast: &HashMap<CityKey, Vec<MeasureValue>>,
) -> Vec<MeasureValue> {
    let observed_by_key = index_by_key(observed);

    let mut result: Vec<MeasureValue> = forecast
        .values()
        .flatten()
        .filter_map(|fc| {
            let obs = observed_by_key.get(&(fc.city.clone(), fc.datetime, fc.name.clone()))?;
            let obs_value = obs.value.as_numeric()?;
            let fc_value = fc.value.as_numeric()?;
            let relative_error = (obs_value - fc_value) / obs_value;
            Some(MeasureValue {
                city: obs.city.clone(),
                datetime: obs.datetime,
                name: obs.name.clone(),
                value: Value::Numeric(relative_error),
                unit: "%".to_string(),
            })
        })
        .collect();

    result.sort_by(|a, b| {
        (&a.city.country, &a.city.city, a.datetime, &a.name)
            .cmp(&(&b.city.country, &b.city.city, b.datetime, &b.name))
    });
    result
}

/// Derives per-day pollutant forecasts over `[start_day, end_day]` from the
/// last day of observed pollution and the daily forecast humidity.
///
/// `recent_pollution` is a daily rollup of the trailing ~24h window, so it
/// carries at most two day entries per pollutant (yesterday and today). Each
/// baseline value is averaged with the adjacent day's value at the same city
/// and name when present, otherwise used as-is; when both days survive the
/// averaging, the more recent one wins as the single baseline per pollutant.
///
/// For each whitelisted pollutant and each day in the window with a forecast
/// humidity value `w` at that city/day, the derived value is `b * w` when
/// `w > 0.5`, else `b / w`. The formula is a fixed heuristic, not a
/// physical model.
pub fn pollutant_forecast(
    recent_pollution: &HashMap<CityKey, Vec<MeasureValue>>,
    forecast_weather: &HashMap<CityKey, Vec<MeasureValue>>,
    start_day: NaiveDate,
    end_day: NaiveDate,
    today: NaiveDate,
) -> Vec<MeasureValue> {
    let pollution_by_key = index_by_key(recent_pollution);
    let weather_by_key = index_by_key(forecast_weather);

    // Collapse the trailing window to one baseline per (city, pollutant),
    // averaging with the adjacent day where available. Iteration is sorted
    // so the later day deterministically wins the collapse.
    let mut baselines: HashMap<(CityKey, String), (f64, String)> = HashMap::new();
    let mut ordered: Vec<&MeasureValue> = pollution_by_key.values().copied().collect();
    ordered.sort_by(|a, b| {
        (&a.city.country, &a.city.city, a.datetime, &a.name)
            .cmp(&(&b.city.country, &b.city.city, b.datetime, &b.name))
    });

    for m in ordered {
        let value = match m.value.as_numeric() {
            Some(v) => v,
            None => continue,
        };
        let adjacent_day = if m.datetime.date() == today {
            m.datetime - Duration::days(1)
        } else {
            m.datetime + Duration::days(1)
        };
        let averaged = pollution_by_key
            .get(&(m.city.clone(), adjacent_day, m.name.clone()))
            .and_then(|dual| dual.value.as_numeric())
            .map(|dual| (value + dual) / 2.0)
            .unwrap_or(value);
        baselines.insert((m.city.clone(), m.name.clone()), (averaged, m.unit.clone()));
    }

    let mut result = Vec::new();
    for ((city, name), (baseline, unit)) in &baselines {
        if !FORECASTABLE_POLLUTANTS.contains(&name.as_str()) {
            continue;
        }
        let mut day = start_day;
        while day <= end_day {
            let day_key = day.and_time(NaiveTime::MIN);
            let humidity = weather_by_key
                .get(&(city.clone(), day_key, "humidity".to_string()))
                .and_then(|w| w.value.as_numeric());
            if let Some(w) = humidity {
                let value = if w > 0.5 { baseline * w } else { baseline / w };
                result.push(MeasureValue {
                    city: city.clone(),
                    datetime: day_key,
                    name: name.clone(),
                    value: Value::Numeric(value),
                    unit: unit.clone(),
                });
            }
            day += Duration::days(1);
        }
    }

    result.sort_by(|a, b| {
        (&a.city.country, &a.city.city, a.datetime, &a.name)
            .cmp(&(&b.city.country, &b.city.city, b.datetime, &b.name))
    });
    result
}
