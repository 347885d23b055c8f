//! City identity and location records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The `(country, city)` identity pair.
///
/// Equality and hashing are case-sensitive so storage stays case-preserving;
/// case-insensitive matching is a search concern (see
/// [`crate::db::Store::search_locations`]) and [`CityKey::matches_ignore_case`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CityKey {
    pub country: String,
    pub city: String,
}

impl CityKey {
    pub fn new(country: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            city: city.into(),
        }
    }

    /// Case-insensitive comparison used for search/collation purposes.
    pub fn matches_ignore_case(&self, country: &str, city: &str) -> bool {
        self.country.eq_ignore_ascii_case(country) && self.city.eq_ignore_ascii_case(city)
    }
}

impl fmt::Display for CityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.city, self.country)
    }
}

/// Geographical coordinates of a city centroid.
///
/// Used for distance calculations and upstream API calls only, never as
/// identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A city as stored in the `locations` collection.
///
/// `enabled` flips via an explicit moderation action that cascades to all
/// measurement buckets for the city. `vote_count` is derived by aggregation
/// (never stored on the record) and is only populated by the top-N query.
#[derive(Debug, Clone, PartialEq)]
pub struct City {
    pub key: CityKey,
    pub coordinates: Option<Coordinates>,
    pub enabled: bool,
    pub vote_count: Option<i64>,
}

impl City {
    pub fn new(
        country: impl Into<String>,
        city: impl Into<String>,
        coordinates: Option<Coordinates>,
        enabled: bool,
    ) -> Self {
        Self {
            key: CityKey::new(country, city),
            coordinates,
            enabled,
            vote_count: None,
        }
    }

    pub fn country(&self) -> &str {
        &self.key.country
    }

    pub fn city(&self) -> &str {
        &self.key.city
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if let Some(c) = &self.coordinates {
            write!(f, " at ({},{})", c.latitude, c.longitude)?;
        }
        if let Some(votes) = self.vote_count {
            write!(f, " voted by {}", votes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_key_identity_is_case_sensitive() {
        let roma = CityKey::new("IT", "Roma");
        assert_ne!(roma, CityKey::new("IT", "roma"));
        assert_eq!(roma, CityKey::new("IT", "Roma"));
    }

    #[test]
    fn city_key_search_match_ignores_case() {
        let roma = CityKey::new("IT", "Roma");
        assert!(roma.matches_ignore_case("it", "ROMA"));
        assert!(!roma.matches_ignore_case("IT", "Milano"));
    }
}
