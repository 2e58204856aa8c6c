//! Country entity
//!
//! Keyed by ISO 3166-1 alpha-2 `code`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fields::{area, Fields, Payload};
use super::{normalize_code, CountryCode, ValidationError};

const FIELDS: &[&str] = &["code", "name", "continent", "capital", "population", "area_km2"];

/// Continents accepted for `continent`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Continent {
    Africa,
    Antarctica,
    Asia,
    Europe,
    #[serde(rename = "North America")]
    NorthAmerica,
    Oceania,
    #[serde(rename = "South America")]
    SouthAmerica,
}

impl Continent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Africa => "Africa",
            Self::Antarctica => "Antarctica",
            Self::Asia => "Asia",
            Self::Europe => "Europe",
            Self::NorthAmerica => "North America",
            Self::Oceania => "Oceania",
            Self::SouthAmerica => "South America",
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::Africa,
            Self::Antarctica,
            Self::Asia,
            Self::Europe,
            Self::NorthAmerica,
            Self::Oceania,
            Self::SouthAmerica,
        ]
    }

    /// Parse a continent name, case-insensitively and ignoring extra spaces.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let wanted = super::normalize_name(s).to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|c| c.as_str().to_lowercase() == wanted)
            .ok_or_else(|| ValidationError::InvalidVariant {
                field: "continent",
                value: s.to_owned(),
            })
    }
}

/// Stored country document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continent: Option<Continent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_km2: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Country {
    /// Validate a create payload and stamp it with `now`.
    pub fn from_payload(payload: &Payload, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let fields = Fields::new(payload, FIELDS)?;
        let code = CountryCode::new(fields.required_str("code")?)?;
        let continent = fields
            .optional_str("continent")?
            .map(Continent::parse)
            .transpose()?;

        Ok(Self {
            code: code.into_string(),
            name: fields.required_name("name")?,
            continent,
            capital: fields.optional_name("capital")?,
            population: fields.optional_count("population")?,
            area_km2: area(&fields)?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Primary lookup key.
    pub fn key(&self) -> Result<CountryCode, ValidationError> {
        CountryCode::new(&self.code)
    }
}

/// Partial update for a country; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CountryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continent: Option<Continent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capital: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_km2: Option<f64>,
}

impl CountryPatch {
    /// Validate an update payload for the country at `key`.
    pub fn from_payload(payload: &Payload, key: &CountryCode) -> Result<Self, ValidationError> {
        let fields = Fields::new(payload, FIELDS)?;
        fields.unchanged("code", key.as_str(), normalize_code)?;

        let patch = Self {
            name: fields.optional_name("name")?,
            continent: fields
                .optional_str("continent")?
                .map(Continent::parse)
                .transpose()?,
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
    fn parses_full_payload() {
        let now = Utc::now();
        let p = payload(json!({
            "code": "us",
            "name": " United   States ",
            "continent": "north america",
            "capital": "Washington D.C.",
            "population": 331000000,
            "area_km2": 9833517
        }));
        let country = Country::from_payload(&p, now).unwrap();
        assert_eq!(country.code, "US");
        assert_eq!(country.name, "United States");
        assert_eq!(country.continent, Some(Continent::NorthAmerica));
        assert_eq!(country.area_km2, Some(9833517.0));
        assert_eq!(country.created_at, now);
        assert_eq!(country.updated_at, now);
    }

    #[test]
    fn requires_code_and_name() {
        let err = Country::from_payload(&payload(json!({"name": "X"})), Utc::now()).unwrap_err();
        assert_eq!(err, ValidationError::Missing { field: "code" });

        let err = Country::from_payload(&payload(json!({"code": "XX"})), Utc::now()).unwrap_err();
        assert_eq!(err, ValidationError::Missing { field: "name" });
    }

    #[test]
    fn rejects_unknown_continent() {
        let p = payload(json!({"code": "XX", "name": "X", "continent": "Atlantis"}));
        assert!(matches!(
            Country::from_payload(&p, Utc::now()),
            Err(ValidationError::InvalidVariant { .. })
        ));
    }

    #[test]
    fn client_timestamps_are_ignored() {
        let p = payload(json!({
            "code": "XX",
            "name": "X",
            "created_at": "1999-01-01T00:00:00Z"
        }));
        let now = Utc::now();
        let country = Country::from_payload(&p, now).unwrap();
        assert_eq!(country.created_at, now);
    }

    #[test]
    fn serializes_continent_with_space() {
        let value = serde_json::to_value(Continent::SouthAmerica).unwrap();
        assert_eq!(value, json!("South America"));
    }

    #[test]
    fn patch_rejects_code_change() {
        let key = CountryCode::new("US").unwrap();
        let err = CountryPatch::from_payload(&payload(json!({"code": "CA"})), &key).unwrap_err();
        assert_eq!(err, ValidationError::Immutable { field: "code" });
    }

    #[test]
    fn patch_requires_a_field() {
        let key = CountryCode::new("US").unwrap();
        let err = CountryPatch::from_payload(&payload(json!({"code": "US"})), &key).unwrap_err();
        assert_eq!(err, ValidationError::Empty { field: "update" });
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let key = CountryCode::new("US").unwrap();
        let patch =
            CountryPatch::from_payload(&payload(json!({"population": 5})), &key).unwrap();
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"population": 5}));
    }
}
