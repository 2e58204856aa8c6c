//! State entity
//!
//! Keyed by `(country_code, state_code)`; `state_code` is only unique within
//! its country.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fields::{area, Fields, Payload};
use super::{normalize_code, CountryCode, StateCode, ValidationError};

const FIELDS: &[&str] = &[
    "state_code",
    "country_code",
    "name",
    "capital",
    "population",
    "area_km2",
];

/// Primary lookup key for a state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub country_code: CountryCode,
    pub state_code: StateCode,
}

impl StateKey {
    pub fn new(country_code: &str, state_code: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            country_code: CountryCode::new(country_code)?,
            state_code: StateCode::new(state_code)?,
        })
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.country_code, self.state_code)
    }
}

/// Stored state document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub state_code: String,
    pub country_code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_km2: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl State {
    /// Validate a create payload and stamp it with `now`.
    pub fn from_payload(payload: &Payload, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let fields = Fields::new(payload, FIELDS)?;
        let key = StateKey::new(
            fields.required_str("country_code")?,
            fields.required_str("state_code")?,
        )?;

        Ok(Self {
            state_code: key.state_code.into_string(),
            country_code: key.country_code.into_string(),
            name: fields.required_name("name")?,
            capital: fields.optional_name("capital")?,
            population: fields.optional_count("population")?,
            area_km2: area(&fields)?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Primary lookup key.
    pub fn key(&self) -> Result<StateKey, ValidationError> {
        StateKey::new(&self.country_code, &self.state_code)
    }
}

/// Partial update for a state; key fields are immutable
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capital: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_km2: Option<f64>,
}

impl StatePatch {
    pub fn from_payload(payload: &Payload, key: &StateKey) -> Result<Self, ValidationError> {
        let fields = Fields::new(payload, FIELDS)?;
        fields.unchanged("country_code", key.country_code.as_str(), normalize_code)?;
        fields.unchanged("state_code", key.state_code.as_str(), normalize_code)?;

        let patch = Self {
            name: fields.optional_name("name")?,
            capital: fields.optional_name("capital")?,
            population: fields.optional_count("population")?,
            area_km2: area(&fields)?,
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

    #[test]
    fn minimal_state() {
        let p = payload(json!({"state_code": "ts", "country_code": "us", "name": "Test State"}));
        let state = State::from_payload(&p, Utc::now()).unwrap();
        assert_eq!(state.state_code, "TS");
        assert_eq!(state.country_code, "US");
        assert_eq!(state.capital, None);
        assert_eq!(state.key().unwrap().to_string(), "US/TS");
    }

    #[test]
    fn wrong_type_population() {
        let p = payload(json!({
            "state_code": "TS",
            "country_code": "US",
            "name": "Test State",
            "population": "lots"
        }));
        assert_eq!(
            State::from_payload(&p, Utc::now()).unwrap_err(),
            ValidationError::WrongType {
                field: "population",
                expected: "an integer"
            }
        );
    }

    #[test]
    fn patch_rejects_moving_country() {
        let key = StateKey::new("US", "TS").unwrap();
        let p = payload(json!({"country_code": "CA", "population": 1}));
        assert_eq!(
            StatePatch::from_payload(&p, &key).unwrap_err(),
            ValidationError::Immutable {
                field: "country_code"
            }
        );
    }
}
