//! Payload field access and string normalisation
//!
//! Entity payloads are JSON objects. [`Fields`] reads typed values out of one,
//! rejecting unknown keys and dropping server-managed ones.

use serde_json::{Map, Value};

use super::ValidationError;

/// Raw entity payload as received from a client or a seed file
pub type Payload = Map<String, Value>;

/// Fields owned by the server; client-supplied values are ignored
const SERVER_MANAGED: &[&str] = &["_id", "created_at", "updated_at"];

/// Maximum length for free-text fields (names, capitals)
pub const MAX_TEXT_LEN: usize = 128;

/// Strip surrounding whitespace and collapse inner runs to a single space.
///
/// ```
/// use geoctl_core::models::normalize_name;
///
/// assert_eq!(normalize_name("  New   York "), "New York");
/// ```
pub fn normalize_name(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim and upper-case a code (country or state).
///
/// ```
/// use geoctl_core::models::normalize_code;
///
/// assert_eq!(normalize_code(" us "), "US");
/// ```
pub fn normalize_code(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Typed, schema-checked view over a payload
pub(crate) struct Fields<'a> {
    payload: &'a Payload,
}

impl<'a> Fields<'a> {
    /// Wrap a payload, rejecting any key outside `allowed`.
    pub(crate) fn new(payload: &'a Payload, allowed: &[&str]) -> Result<Self, ValidationError> {
        if let Some(unknown) = payload
            .keys()
            .find(|k| !allowed.contains(&k.as_str()) && !SERVER_MANAGED.contains(&k.as_str()))
        {
            return Err(ValidationError::UnknownField {
                field: unknown.clone(),
            });
        }
        Ok(Self { payload })
    }

    /// Whether the payload carries a non-null value for `field`.
    pub(crate) fn has(&self, field: &str) -> bool {
        self.value(field).is_some()
    }

    fn value(&self, field: &str) -> Option<&'a Value> {
        self.payload.get(field).filter(|v| !v.is_null())
    }

    pub(crate) fn required_name(&self, field: &'static str) -> Result<String, ValidationError> {
        self.optional_name(field)?
            .ok_or(ValidationError::Missing { field })
    }

    /// Free text, whitespace-normalised, non-empty, bounded length.
    pub(crate) fn optional_name(
        &self,
        field: &'static str,
    ) -> Result<Option<String>, ValidationError> {
        let Some(raw) = self.optional_str(field)? else {
            return Ok(None);
        };
        let name = normalize_name(raw);
        if name.is_empty() {
            return Err(ValidationError::Empty { field });
        }
        if name.chars().count() > MAX_TEXT_LEN {
            return Err(ValidationError::TooLong {
                field,
                max: MAX_TEXT_LEN,
            });
        }
        Ok(Some(name))
    }

    pub(crate) fn required_str(&self, field: &'static str) -> Result<&'a str, ValidationError> {
        self.optional_str(field)?
            .ok_or(ValidationError::Missing { field })
    }

    pub(crate) fn optional_str(
        &self,
        field: &'static str,
    ) -> Result<Option<&'a str>, ValidationError> {
        match self.value(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(ValidationError::WrongType {
                field,
                expected: "a string",
            }),
        }
    }

    /// Non-negative integer (counts such as population), storable as a
    /// signed 64-bit BSON integer.
    pub(crate) fn optional_count(
        &self,
        field: &'static str,
    ) -> Result<Option<u64>, ValidationError> {
        match self.value(field) {
            None => Ok(None),
            Some(Value::Number(n)) => {
                if let Some(v) = n.as_u64() {
                    if i64::try_from(v).is_err() {
                        return Err(ValidationError::OutOfRange {
                            field,
                            reason: "must not exceed 9223372036854775807",
                        });
                    }
                    Ok(Some(v))
                } else if n.as_i64().is_some() {
                    Err(ValidationError::OutOfRange {
                        field,
                        reason: "must be zero or a positive integer",
                    })
                } else {
                    Err(ValidationError::WrongType {
                        field,
                        expected: "an integer",
                    })
                }
            }
            Some(_) => Err(ValidationError::WrongType {
                field,
                expected: "an integer",
            }),
        }
    }

    /// Finite number within `min..=max`.
    pub(crate) fn optional_number(
        &self,
        field: &'static str,
        min: f64,
        max: f64,
        reason: &'static str,
    ) -> Result<Option<f64>, ValidationError> {
        match self.value(field) {
            None => Ok(None),
            Some(Value::Number(n)) => {
                let v = n.as_f64().ok_or(ValidationError::WrongType {
                    field,
                    expected: "a number",
                })?;
                if !v.is_finite() || v < min || v > max {
                    return Err(ValidationError::OutOfRange { field, reason });
                }
                Ok(Some(v))
            }
            Some(_) => Err(ValidationError::WrongType {
                field,
                expected: "a number",
            }),
        }
    }

    /// Nested object, for composite fields such as coordinates.
    pub(crate) fn optional_object(
        &self,
        field: &'static str,
    ) -> Result<Option<&'a Payload>, ValidationError> {
        match self.value(field) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(ValidationError::WrongType {
                field,
                expected: "an object",
            }),
        }
    }

    /// Reject a key field whose value differs from the path key.
    ///
    /// The same value is accepted so that clients can send a full document
    /// back on PUT.
    pub(crate) fn unchanged(
        &self,
        field: &'static str,
        current: &str,
        normalize: fn(&str) -> String,
    ) -> Result<(), ValidationError> {
        match self.optional_str(field)? {
            Some(v) if normalize(v) != current => Err(ValidationError::Immutable { field }),
            _ => Ok(()),
        }
    }
}

/// Area in square kilometres; shared by every entity.
pub(crate) fn area(fields: &Fields<'_>) -> Result<Option<f64>, ValidationError> {
    fields.optional_number("area_km2", 0.0, f64::MAX, "must be zero or positive")
}
