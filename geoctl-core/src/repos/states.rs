//! State repository
//!
//! States reference their country; creating one under an unknown country is a
//! validation error.

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use super::{
    cached_find, delete, find_page, insert, parse_sort, patch_document, population_range,
    to_document, update, CountryRepo, STATES,
};
use crate::cache::EntityCache;
use crate::connection::ConnectionManager;
use crate::error::{GeoError, Result};
use crate::models::{
    CountryCode, Paginated, Pagination, Payload, State, StateKey, StatePatch, ValidationError,
};
use crate::store::Filter;

const RESOURCE: &str = "state";

const SORTABLE: &[&str] = &[
    "state_code",
    "country_code",
    "name",
    "population",
    "area_km2",
    "created_at",
];

/// List filters for states
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateFilter {
    pub country_code: Option<String>,
    pub min_population: Option<i64>,
    pub max_population: Option<i64>,
}

impl StateFilter {
    fn to_filter(&self) -> Result<Filter> {
        let mut filter = Filter::new();
        if let Some(raw) = &self.country_code {
            filter = filter.eq("country_code", CountryCode::new(raw)?.into_string());
        }
        Ok(population_range(
            filter,
            self.min_population,
            self.max_population,
        )?)
    }
}

fn key_filter(key: &StateKey) -> Filter {
    Filter::new()
        .eq("country_code", key.country_code.as_str())
        .eq("state_code", key.state_code.as_str())
}

pub struct StateRepo<'a> {
    conn: &'a ConnectionManager,
    cache: &'a EntityCache<StateKey, State>,
    countries: CountryRepo<'a>,
}

impl<'a> StateRepo<'a> {
    pub fn new(
        conn: &'a ConnectionManager,
        cache: &'a EntityCache<StateKey, State>,
        countries: CountryRepo<'a>,
    ) -> Self {
        Self {
            conn,
            cache,
            countries,
        }
    }

    pub async fn list(
        &self,
        filter: &StateFilter,
        page: Pagination,
        sort: Option<&str>,
    ) -> Result<Paginated<State>> {
        let query = filter.to_filter()?;
        let sort = parse_sort(sort, SORTABLE)?;
        find_page(self.conn, STATES, query, page, sort).await
    }

    pub async fn get(&self, key: &StateKey) -> Result<State> {
        self.find(key)
            .await?
            .ok_or_else(|| GeoError::not_found(RESOURCE, key.to_string()))
    }

    pub async fn exists(&self, key: &StateKey) -> Result<bool> {
        Ok(self.find(key).await?.is_some())
    }

    async fn find(&self, key: &StateKey) -> Result<Option<State>> {
        cached_find(self.conn, self.cache, STATES, key, key_filter(key)).await
    }

    pub async fn create(&self, payload: &Payload) -> Result<State> {
        let state = State::from_payload(payload, Utc::now())?;
        let key = state.key()?;

        if !self.countries.exists(&key.country_code).await? {
            return Err(ValidationError::MissingParent {
                resource: "country",
                key: key.country_code.to_string(),
            }
            .into());
        }
        if self.exists(&key).await? {
            return Err(GeoError::duplicate(RESOURCE, key.to_string()));
        }
        let ticket = self.cache.ticket();
        insert(self.conn, STATES, to_document(&state)?)
            .await
            .map_err(|e| e.for_key(RESOURCE, &key.to_string()))?;

        if !self.cache.fill(key.clone(), state.clone(), ticket) {
            debug!(%key, "write raced insert, not caching");
        }
        info!(%key, "state created");
        Ok(state)
    }

    pub async fn update(&self, key: &StateKey, payload: &Payload) -> Result<State> {
        let patch = StatePatch::from_payload(payload, key)?;
        let matched = update(self.conn, STATES, key_filter(key), patch_document(&patch)?).await?;
        self.cache.invalidate(key);
        if matched == 0 {
            return Err(GeoError::not_found(RESOURCE, key.to_string()));
        }
        info!(%key, "state updated");
        self.get(key).await
    }

    pub async fn delete(&self, key: &StateKey) -> Result<()> {
        let deleted = delete(self.conn, STATES, key_filter(key)).await?;
        self.cache.invalidate(key);
        if deleted == 0 {
            return Err(GeoError::not_found(RESOURCE, key.to_string()));
        }
        info!(%key, "state deleted");
        Ok(())
    }
}
