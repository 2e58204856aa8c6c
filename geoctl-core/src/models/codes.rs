//! Country and state code validation
//!
//! Codes are trimmed and upper-cased before matching, so ` us ` and `US` name
//! the same country.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use super::fields::normalize_code;
use super::ValidationError;

/// ISO 3166-1 alpha-2
static COUNTRY_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}$").expect("invalid country code regex"));

/// Subdivision codes: up to three alphanumerics (e.g. `NY`, `BCN`, `01`)
static STATE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{1,3}$").expect("invalid state code regex"));

/// Validated ISO 3166-1 alpha-2 country code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CountryCode(String);

impl CountryCode {
    /// Create a country code, normalising and validating it.
    ///
    /// # Example
    /// ```
    /// use geoctl_core::models::CountryCode;
    ///
    /// assert_eq!(CountryCode::new(" us ").unwrap().as_str(), "US");
    /// assert!(CountryCode::new("USA").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        parse(s, "country_code", &COUNTRY_CODE_RE, "must be two letters (ISO 3166-1 alpha-2)")
            .map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Validated state (subdivision) code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateCode(String);

impl StateCode {
    /// Create a state code, normalising and validating it.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        parse(s, "state_code", &STATE_CODE_RE, "must be one to three letters or digits")
            .map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<CountryCode> for StateCode {
    /// Country codes are valid state codes; used by the city fallback.
    fn from(code: CountryCode) -> Self {
        Self(code.0)
    }
}

fn parse(
    s: &str,
    field: &'static str,
    re: &Regex,
    reason: &'static str,
) -> Result<String, ValidationError> {
    let code = normalize_code(s);
    if code.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if !re.is_match(&code) {
        return Err(ValidationError::InvalidFormat { field, reason });
    }
    Ok(code)
}

impl AsRef<str> for CountryCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for StateCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
