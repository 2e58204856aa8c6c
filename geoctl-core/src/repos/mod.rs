//! Entity repositories
//!
//! Each repository borrows the connection manager and its entity cache:
//! - validation runs before any database call
//! - reads go through the cache; misses fill it under a ticket
//! - writes hit the database first, then update or evict the cache entry
//! - every store call runs inside `ConnectionManager::ensure_connection`

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::EntityCache;
use crate::connection::ConnectionManager;
use crate::error::{GeoError, Result};
use crate::models::{Paginated, Pagination, ValidationError};
use crate::store::{Document, Filter, FindOptions, Sort, SortDirection};

pub mod cities;
pub mod countries;
pub mod states;

pub use cities::{CityFilter, CityRepo};
pub use countries::{CountryFilter, CountryRepo};
pub use states::{StateFilter, StateRepo};

pub const COUNTRIES: &str = "countries";
pub const STATES: &str = "states";
pub const CITIES: &str = "cities";

pub(crate) fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(GeoError::database(format!(
            "expected an object, serialized {other}"
        ))),
        Err(e) => Err(GeoError::database(e.to_string())),
    }
}

pub(crate) fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| GeoError::database(format!("malformed stored document: {e}")))
}

/// Parse `field` or `-field` against the entity's sortable fields.
pub(crate) fn parse_sort(
    raw: Option<&str>,
    allowed: &[&'static str],
) -> std::result::Result<Option<Sort>, ValidationError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let (field, direction) = match raw.strip_prefix('-') {
        Some(field) => (field, SortDirection::Descending),
        None => (raw.strip_prefix('+').unwrap_or(raw), SortDirection::Ascending),
    };
    if !allowed.contains(&field) {
        return Err(ValidationError::InvalidVariant {
            field: "sort",
            value: raw.to_string(),
        });
    }
    Ok(Some(Sort {
        field: field.to_string(),
        direction,
    }))
}

/// Add a `population` range to `filter`, checking both bounds.
pub(crate) fn population_range(
    filter: Filter,
    min: Option<i64>,
    max: Option<i64>,
) -> std::result::Result<Filter, ValidationError> {
    for (field, bound) in [("min_population", min), ("max_population", max)] {
        if bound.is_some_and(|v| v < 0) {
            return Err(ValidationError::OutOfRange {
                field,
                reason: "must be zero or positive",
            });
        }
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(ValidationError::OutOfRange {
                field: "min_population",
                reason: "must not exceed max_population",
            });
        }
    }
    Ok(filter.range("population", min, max))
}

/// Count plus one page of documents.
pub(crate) async fn find_page<T: DeserializeOwned>(
    conn: &ConnectionManager,
    collection: &'static str,
    filter: Filter,
    page: Pagination,
    sort: Option<Sort>,
) -> Result<Paginated<T>> {
    let filter = &filter;
    let options = FindOptions {
        skip: page.offset(),
        limit: Some(i64::from(page.limit())),
        sort,
    };
    let options = &options;

    let total = conn
        .ensure_connection(|store| async move { store.count(collection, filter).await })
        .await?;
    let docs = conn
        .ensure_connection(|store| async move { store.find(collection, filter, options).await })
        .await?;

    let items = docs
        .into_iter()
        .map(from_document)
        .collect::<Result<Vec<T>>>()?;
    Ok(Paginated::new(items, total, page))
}

/// Read-through lookup by primary key; `None` when absent.
pub(crate) async fn cached_find<K, V>(
    conn: &ConnectionManager,
    cache: &EntityCache<K, V>,
    collection: &'static str,
    key: &K,
    filter: Filter,
) -> Result<Option<V>>
where
    K: Eq + std::hash::Hash + Clone + std::fmt::Display,
    V: DeserializeOwned + Clone,
{
    let ticket = match cache.lookup(key) {
        Ok(hit) => return Ok(Some(hit)),
        Err(ticket) => ticket,
    };

    let filter = &filter;
    let found = conn
        .ensure_connection(|store| async move { store.find_one(collection, filter).await })
        .await?;
    let Some(doc) = found else {
        return Ok(None);
    };
    let value: V = from_document(doc)?;
    if !cache.fill(key.clone(), value.clone(), ticket) {
        debug!(collection, %key, "write raced read-through, not caching");
    }
    Ok(Some(value))
}

pub(crate) async fn insert(
    conn: &ConnectionManager,
    collection: &'static str,
    doc: Document,
) -> Result<()> {
    let doc = &doc;
    conn.ensure_connection(|store| {
        let doc = doc.clone();
        async move { store.insert_one(collection, doc).await }
    })
    .await
}

/// `$set` on the keyed document; returns the matched count.
pub(crate) async fn update(
    conn: &ConnectionManager,
    collection: &'static str,
    filter: Filter,
    set: Document,
) -> Result<u64> {
    let (filter, set) = (&filter, &set);
    conn.ensure_connection(|store| {
        let set = set.clone();
        async move { store.update_one(collection, filter, set).await }
    })
    .await
}

pub(crate) async fn delete(
    conn: &ConnectionManager,
    collection: &'static str,
    filter: Filter,
) -> Result<u64> {
    let filter = &filter;
    conn.ensure_connection(|store| async move { store.delete_one(collection, filter).await })
        .await
}

/// Serialise a patch and stamp `updated_at`.
pub(crate) fn patch_document<P: Serialize>(patch: &P) -> Result<Document> {
    let mut set = to_document(patch)?;
    let now = serde_json::to_value(chrono::Utc::now())
        .map_err(|e| GeoError::database(e.to_string()))?;
    set.insert("updated_at".to_string(), now);
    Ok(set)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::config::DbConfig;
    use crate::layer::DataLayer;
    use crate::store::MemoryStore;

    /// Started data layer over a fresh in-memory store
    pub(crate) async fn layer(city_state_fallback: bool) -> (Arc<MemoryStore>, DataLayer) {
        let store = MemoryStore::new();
        let config = DbConfig {
            city_state_fallback,
            ..DbConfig::default()
        };
        let layer = DataLayer::in_memory(Arc::clone(&store), &config);
        layer.start().await.unwrap();
        (store, layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[&str] = &["name", "population"];

    #[test]
    fn sort_parsing() {
        assert_eq!(parse_sort(None, FIELDS).unwrap(), None);
        assert_eq!(parse_sort(Some(" "), FIELDS).unwrap(), None);

        let sort = parse_sort(Some("-population"), FIELDS).unwrap().unwrap();
        assert_eq!(sort.field, "population");
        assert_eq!(sort.direction, SortDirection::Descending);

        let sort = parse_sort(Some("name"), FIELDS).unwrap().unwrap();
        assert_eq!(sort.direction, SortDirection::Ascending);
    }

    #[test]
    fn sort_rejects_unlisted_field() {
        assert!(matches!(
            parse_sort(Some("capital"), FIELDS),
            Err(ValidationError::InvalidVariant { field: "sort", .. })
        ));
    }

    #[test]
    fn population_bounds() {
        assert!(population_range(Filter::new(), None, None).unwrap().is_empty());
        assert!(population_range(Filter::new(), Some(10), Some(10)).is_ok());
        assert!(matches!(
            population_range(Filter::new(), Some(-1), None),
            Err(ValidationError::OutOfRange { field: "min_population", .. })
        ));
        assert!(matches!(
            population_range(Filter::new(), Some(5), Some(1)),
            Err(ValidationError::OutOfRange { .. })
        ));
    }
}
