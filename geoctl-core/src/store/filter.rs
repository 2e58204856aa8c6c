//! Backend-neutral query filters and find options

use std::cmp::Ordering;

use mongodb::bson::{self, Bson};
use serde_json::Value;

use super::{Document, StoreError};

/// A single condition on one field
#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Eq { field: String, value: Value },
    /// Inclusive integer range; `None` leaves that side open
    Range {
        field: String,
        min: Option<i64>,
        max: Option<i64>,
    },
}

impl Condition {
    fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Eq { field, value } => doc.get(field) == Some(value),
            Self::Range { field, min, max } => {
                let Some(v) = doc.get(field).and_then(Value::as_f64) else {
                    return false;
                };
                min.map_or(true, |m| v >= m as f64) && max.map_or(true, |m| v <= m as f64)
            }
        }
    }
}

/// Conjunction of conditions; the empty filter matches everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Require `min <= field <= max`. A range with both sides open is dropped.
    pub fn range(mut self, field: impl Into<String>, min: Option<i64>, max: Option<i64>) -> Self {
        if min.is_some() || max.is_some() {
            self.conditions.push(Condition::Range {
                field: field.into(),
                min,
                max,
            });
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate against an in-memory document.
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }

    /// Translate to a MongoDB query document.
    pub fn to_bson(&self) -> Result<bson::Document, StoreError> {
        let mut query = bson::Document::new();
        for condition in &self.conditions {
            match condition {
                Condition::Eq { field, value } => {
                    let value = bson::to_bson(value)
                        .map_err(|e| StoreError::Serialization(e.to_string()))?;
                    query.insert(field.clone(), value);
                }
                Condition::Range { field, min, max } => {
                    let mut range = bson::Document::new();
                    if let Some(min) = min {
                        range.insert("$gte", Bson::Int64(*min));
                    }
                    if let Some(max) = max {
                        range.insert("$lte", Bson::Int64(*max));
                    }
                    query.insert(field.clone(), range);
                }
            }
        }
        Ok(query)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn as_i32(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

/// Single-field sort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn to_bson(&self) -> bson::Document {
        let mut sort = bson::Document::new();
        sort.insert(self.field.clone(), self.direction.as_i32());
        sort
    }

    /// Order two documents by this sort; missing values sort first.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ord = compare_values(a.get(&self.field), b.get(&self.field));
        match self.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        // Mixed types: numbers before strings, everything else equal
        (Some(Value::Number(_)), Some(_)) => Ordering::Less,
        (Some(_), Some(Value::Number(_))) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Paging and ordering for `find`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub skip: u64,
    pub limit: Option<i64>,
    pub sort: Option<Sort>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&doc(json!({"code": "US"}))));
        assert!(Filter::new().to_bson().unwrap().is_empty());
    }

    #[test]
    fn eq_and_range() {
        let filter = Filter::new()
            .eq("country_code", "US")
            .range("population", Some(100), Some(1000));

        assert!(filter.matches(&doc(json!({"country_code": "US", "population": 500}))));
        assert!(!filter.matches(&doc(json!({"country_code": "CA", "population": 500}))));
        assert!(!filter.matches(&doc(json!({"country_code": "US", "population": 5000}))));
        assert!(!filter.matches(&doc(json!({"country_code": "US"}))));
    }

    #[test]
    fn open_range_is_dropped() {
        assert!(Filter::new().range("population", None, None).is_empty());
    }

    #[test]
    fn translates_to_bson() {
        let filter = Filter::new()
            .eq("code", "US")
            .range("population", Some(1), None);
        let query = filter.to_bson().unwrap();
        assert_eq!(query.get_str("code").unwrap(), "US");
        let range = query.get_document("population").unwrap();
        assert_eq!(range.get_i64("$gte").unwrap(), 1);
        assert!(range.get("$lte").is_none());
    }

    #[test]
    fn sort_missing_values_first() {
        let sort = Sort {
            field: "population".into(),
            direction: SortDirection::Ascending,
        };
        let a = doc(json!({"population": 10}));
        let b = doc(json!({}));
        assert_eq!(sort.compare(&a, &b), Ordering::Greater);
        assert_eq!(sort.compare(&b, &a), Ordering::Less);
    }

    #[test]
    fn sort_descending_strings() {
        let sort = Sort {
            field: "name".into(),
            direction: SortDirection::Descending,
        };
        let a = doc(json!({"name": "Austin"}));
        let b = doc(json!({"name": "Boston"}));
        assert_eq!(sort.compare(&a, &b), Ordering::Greater);
        assert_eq!(sort.to_bson().get_i32("name").unwrap(), -1);
    }
}
