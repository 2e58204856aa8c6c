//! City entity
//!
//! Keyed by `(state_code, name)`. Upstream data sometimes lacks a state code;
//! with the fallback enabled the country code stands in for it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fields::{area, normalize_name, Fields, Payload, MAX_TEXT_LEN};
use super::{normalize_code, CountryCode, StateCode, ValidationError};

const FIELDS: &[&str] = &[
    "name",
    "state_code",
    "country_code",
    "population",
    "area_km2",
    "coordinates",
];

/// Primary lookup key for a city
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CityKey {
    pub state_code: StateCode,
    pub name: String,
}

impl CityKey {
    pub fn new(state_code: &str, name: &str) -> Result<Self, ValidationError> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }
        if name.chars().count() > MAX_TEXT_LEN {
            return Err(ValidationError::TooLong {
                field: "name",
                max: MAX_TEXT_LEN,
            });
        }
        Ok(Self {
            state_code: StateCode::new(state_code)?,
            name,
        })
    }
}

impl fmt::Display for CityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.state_code, self.name)
    }
}

/// Where a city's `state_code` came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSource {
    /// Supplied in the payload; the state must exist
    Given,
    /// Copied from `country_code` because the payload had none
    CountryFallback,
}

/// Latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    fn from_payload(payload: &Payload) -> Result<Self, ValidationError> {
        let fields = Fields::new(payload, &["lat", "lon"])?;
        let lat = fields
            .optional_number("lat", -90.0, 90.0, "must be between -90 and 90")?
            .ok_or(ValidationError::Missing {
                field: "coordinates.lat",
            })?;
        let lon = fields
            .optional_number("lon", -180.0, 180.0, "must be between -180 and 180")?
            .ok_or(ValidationError::Missing {
                field: "coordinates.lon",
            })?;
        Ok(Self { lat, lon })
    }
}

fn coordinates(fields: &Fields<'_>) -> Result<Option<Coordinates>, ValidationError> {
    fields
        .optional_object("coordinates")?
        .map(Coordinates::from_payload)
        .transpose()
}

/// Stored city document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub state_code: String,
    pub country_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_km2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl City {
    /// Validate a create payload and stamp it with `now`.
    ///
    /// A missing `state_code` is an error unless `state_fallback` is set, in
    /// which case the country code is stored in its place.
    pub fn from_payload(
        payload: &Payload,
        now: DateTime<Utc>,
        state_fallback: bool,
    ) -> Result<(Self, StateSource), ValidationError> {
        let fields = Fields::new(payload, FIELDS)?;
        let country_code = CountryCode::new(fields.required_str("country_code")?)?;

        let (state_code, source) = match fields.optional_str("state_code")? {
            Some(code) => (StateCode::new(code)?, StateSource::Given),
            None if state_fallback => (
                StateCode::from(country_code.clone()),
                StateSource::CountryFallback,
            ),
            None => return Err(ValidationError::Missing { field: "state_code" }),
        };
        let key = CityKey::new(state_code.as_str(), fields.required_str("name")?)?;

        let city = Self {
            name: key.name,
            state_code: key.state_code.into_string(),
            country_code: country_code.into_string(),
            population: fields.optional_count("population")?,
            area_km2: area(&fields)?,
            coordinates: coordinates(&fields)?,
            created_at: now,
            updated_at: now,
        };
        Ok((city, source))
    }

    /// Primary lookup key.
    pub fn key(&self) -> Result<CityKey, ValidationError> {
        CityKey::new(&self.state_code, &self.name)
    }
}

/// Partial update for a city; name, state and country are immutable
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CityPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_km2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

impl CityPatch {
    pub fn from_payload(
        payload: &Payload,
        key: &CityKey,
        country_code: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let fields = Fields::new(payload, FIELDS)?;
        fields.unchanged("name", &key.name, normalize_name)?;
        fields.unchanged("state_code", key.state_code.as_str(), normalize_code)?;
        if let Some(current) = country_code {
            fields.unchanged("country_code", current, normalize_code)?;
        }

        let patch = Self {
            population: fields.optional_count("population")?,
            area_km2: area(&fields)?,
            coordinates: coordinates(&fields)?,
        };
        if patch == Self::default() {
            return Err(ValidationError::Empty { field: "update" });
        }
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    fn springfield() -> Payload {
        payload(json!({
            "name": "Springfield",
            "state_code": "IL",
            "country_code": "US",
            "population": 116000,
            "area_km2": 160,
            "coordinates": {"lat": 39.78, "lon": -89.64}
        }))
    }

    #[test]
    fn parses_city() {
        let (city, source) = City::from_payload(&springfield(), Utc::now(), false).unwrap();
        assert_eq!(source, StateSource::Given);
        assert_eq!(city.key().unwrap().to_string(), "IL/Springfield");
        assert_eq!(
            city.coordinates,
            Some(Coordinates {
                lat: 39.78,
                lon: -89.64
            })
        );
    }

    #[test]
    fn missing_state_without_fallback_is_rejected() {
        let p = payload(json!({"name": "Monaco", "country_code": "MC"}));
        assert_eq!(
            City::from_payload(&p, Utc::now(), false).unwrap_err(),
            ValidationError::Missing { field: "state_code" }
        );
    }

    #[test]
    fn missing_state_with_fallback_uses_country() {
        let p = payload(json!({"name": "Monaco", "country_code": "mc"}));
        let (city, source) = City::from_payload(&p, Utc::now(), true).unwrap();
        assert_eq!(source, StateSource::CountryFallback);
        assert_eq!(city.state_code, "MC");
    }

    #[test]
    fn coordinates_out_of_range() {
        let mut p = springfield();
        p.insert("coordinates".into(), json!({"lat": 91.0, "lon": 0.0}));
        assert!(matches!(
            City::from_payload(&p, Utc::now(), false),
            Err(ValidationError::OutOfRange { field: "lat", .. })
        ));
    }

    #[test]
    fn coordinates_need_both_axes() {
        let mut p = springfield();
        p.insert("coordinates".into(), json!({"lat": 10.0}));
        assert_eq!(
            City::from_payload(&p, Utc::now(), false).unwrap_err(),
            ValidationError::Missing {
                field: "coordinates.lon"
            }
        );
    }

    #[test]
    fn key_normalises_name() {
        let key = CityKey::new("il", "  Springfield  ").unwrap();
        assert_eq!(key.name, "Springfield");
        assert_eq!(key.state_code.as_str(), "IL");
    }

    #[test]
    fn patch_rejects_rename() {
        let key = CityKey::new("IL", "Springfield").unwrap();
        let p = payload(json!({"name": "Shelbyville", "population": 1}));
        assert_eq!(
            CityPatch::from_payload(&p, &key, None).unwrap_err(),
            ValidationError::Immutable { field: "name" }
        );
    }
}
