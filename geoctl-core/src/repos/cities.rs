//! City repository
//!
//! Cities reference a country and, unless the state fallback applied, a state
//! within that country.

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use super::{
    cached_find, delete, find_page, insert, parse_sort, patch_document, population_range,
    to_document, update, CountryRepo, StateRepo, CITIES,
};
use crate::cache::EntityCache;
use crate::connection::ConnectionManager;
use crate::error::{GeoError, Result};
use crate::models::{
    City, CityKey, CityPatch, CountryCode, Paginated, Pagination, Payload, StateCode, StateKey,
    StateSource, ValidationError,
};
use crate::store::Filter;

const RESOURCE: &str = "city";

const SORTABLE: &[&str] = &[
    "name",
    "state_code",
    "country_code",
    "population",
    "area_km2",
    "created_at",
];

/// List filters for cities
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CityFilter {
    pub country_code: Option<String>,
    pub state_code: Option<String>,
    pub min_population: Option<i64>,
    pub max_population: Option<i64>,
}

impl CityFilter {
    fn to_filter(&self) -> Result<Filter> {
        let mut filter = Filter::new();
        if let Some(raw) = &self.country_code {
            filter = filter.eq("country_code", CountryCode::new(raw)?.into_string());
        }
        if let Some(raw) = &self.state_code {
            filter = filter.eq("state_code", StateCode::new(raw)?.into_string());
        }
        Ok(population_range(
            filter,
            self.min_population,
            self.max_population,
        )?)
    }
}

fn key_filter(key: &CityKey) -> Filter {
    Filter::new()
        .eq("state_code", key.state_code.as_str())
        .eq("name", key.name.as_str())
}

pub struct CityRepo<'a> {
    conn: &'a ConnectionManager,
    cache: &'a EntityCache<CityKey, City>,
    countries: CountryRepo<'a>,
    states: StateRepo<'a>,
    state_fallback: bool,
}

impl<'a> CityRepo<'a> {
    pub fn new(
        conn: &'a ConnectionManager,
        cache: &'a EntityCache<CityKey, City>,
        countries: CountryRepo<'a>,
        states: StateRepo<'a>,
        state_fallback: bool,
    ) -> Self {
        Self {
            conn,
            cache,
            countries,
            states,
            state_fallback,
        }
    }

    pub async fn list(
        &self,
        filter: &CityFilter,
        page: Pagination,
        sort: Option<&str>,
    ) -> Result<Paginated<City>> {
        let query = filter.to_filter()?;
        let sort = parse_sort(sort, SORTABLE)?;
        find_page(self.conn, CITIES, query, page, sort).await
    }

    pub async fn get(&self, key: &CityKey) -> Result<City> {
        self.find(key)
            .await?
            .ok_or_else(|| GeoError::not_found(RESOURCE, key.to_string()))
    }

    pub async fn exists(&self, key: &CityKey) -> Result<bool> {
        Ok(self.find(key).await?.is_some())
    }

    async fn find(&self, key: &CityKey) -> Result<Option<City>> {
        cached_find(self.conn, self.cache, CITIES, key, key_filter(key)).await
    }

    pub async fn create(&self, payload: &Payload) -> Result<City> {
        let (city, source) = City::from_payload(payload, Utc::now(), self.state_fallback)?;
        let key = city.key()?;
        let country_code = CountryCode::new(&city.country_code)?;

        if !self.countries.exists(&country_code).await? {
            return Err(ValidationError::MissingParent {
                resource: "country",
                key: country_code.to_string(),
            }
            .into());
        }
        match source {
            StateSource::Given => {
                let state = StateKey {
                    country_code,
                    state_code: key.state_code.clone(),
                };
                if !self.states.exists(&state).await? {
                    return Err(ValidationError::MissingParent {
                        resource: "state",
                        key: state.to_string(),
                    }
                    .into());
                }
            }
            StateSource::CountryFallback => {
                debug!(%key, "city has no state_code, using country code");
            }
        }

        if self.exists(&key).await? {
            return Err(GeoError::duplicate(RESOURCE, key.to_string()));
        }
        let ticket = self.cache.ticket();
        insert(self.conn, CITIES, to_document(&city)?)
            .await
            .map_err(|e| e.for_key(RESOURCE, &key.to_string()))?;

        if !self.cache.fill(key.clone(), city.clone(), ticket) {
            debug!(%key, "write raced insert, not caching");
        }
        info!(%key, "city created");
        Ok(city)
    }

    pub async fn update(&self, key: &CityKey, payload: &Payload) -> Result<City> {
        let mut patch = CityPatch::from_payload(payload, key, None)?;
        if payload.contains_key("country_code") {
            // Compare against the stored country before writing anything
            let current = self.get(key).await?;
            patch = CityPatch::from_payload(payload, key, Some(&current.country_code))?;
        }

        let matched = update(self.conn, CITIES, key_filter(key), patch_document(&patch)?).await?;
        self.cache.invalidate(key);
        if matched == 0 {
            return Err(GeoError::not_found(RESOURCE, key.to_string()));
        }
        info!(%key, "city updated");
        self.get(key).await
    }

    pub async fn delete(&self, key: &CityKey) -> Result<()> {
        let deleted = delete(self.conn, CITIES, key_filter(key)).await?;
        self.cache.invalidate(key);
        if deleted == 0 {
            return Err(GeoError::not_found(RESOURCE, key.to_string()));
        }
        info!(%key, "city deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::layer;
    use super::*;
    use crate::layer::DataLayer;
    use serde_json::{json, Value};

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    async fn with_parents(layer: &DataLayer) {
        for code in ["US", "MC"] {
            layer
                .countries()
                .create(&payload(json!({"code": code, "name": code})))
                .await
                .unwrap();
        }
        layer
            .states()
            .create(&payload(
                json!({"state_code": "IL", "country_code": "US", "name": "Illinois"}),
            ))
            .await
            .unwrap();
    }

    fn springfield() -> Payload {
        payload(json!({
            "name": "Springfield",
            "state_code": "IL",
            "country_code": "US",
            "population": 116000
        }))
    }

    fn key(state: &str, name: &str) -> CityKey {
        CityKey::new(state, name).unwrap()
    }

    #[tokio::test]
    async fn create_get_update_delete() {
        let (_, layer) = layer(false).await;
        with_parents(&layer).await;
        let repo = layer.cities();

        let created = repo.create(&springfield()).await.unwrap();
        assert_eq!(
            repo.get(&key("il", " Springfield ")).await.unwrap(),
            created
        );

        let updated = repo
            .update(
                &key("IL", "Springfield"),
                &payload(json!({"coordinates": {"lat": 39.8, "lon": -89.6}, "country_code": "US"})),
            )
            .await
            .unwrap();
        assert_eq!(updated.population, Some(116000));
        assert!(updated.coordinates.is_some());

        repo.delete(&key("IL", "Springfield")).await.unwrap();
        assert!(matches!(
            repo.get(&key("IL", "Springfield")).await,
            Err(GeoError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_state_is_rejected() {
        let (_, layer) = layer(false).await;
        with_parents(&layer).await;
        let mut p = springfield();
        p.insert("state_code".into(), json!("OH"));
        let err = layer.cities().create(&p).await.unwrap_err();
        assert!(matches!(
            err,
            GeoError::Validation(ValidationError::MissingParent {
                resource: "state",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn missing_state_rejected_without_fallback() {
        let (_, layer) = layer(false).await;
        with_parents(&layer).await;
        let err = layer
            .cities()
            .create(&payload(json!({"name": "Monaco", "country_code": "MC"})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GeoError::Validation(ValidationError::Missing { field: "state_code" })
        ));
    }

    #[tokio::test]
    async fn fallback_stores_country_as_state() {
        let (_, layer) = layer(true).await;
        with_parents(&layer).await;
        let city = layer
            .cities()
            .create(&payload(json!({"name": "Monaco", "country_code": "MC"})))
            .await
            .unwrap();
        assert_eq!(city.state_code, "MC");
        assert!(layer.cities().exists(&key("MC", "Monaco")).await.unwrap());
    }

    #[tokio::test]
    async fn update_rejects_moving_country() {
        let (_, layer) = layer(false).await;
        with_parents(&layer).await;
        let repo = layer.cities();
        repo.create(&springfield()).await.unwrap();
        let err = repo
            .update(
                &key("IL", "Springfield"),
                &payload(json!({"country_code": "MC", "population": 1})),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GeoError::Validation(ValidationError::Immutable {
                field: "country_code"
            })
        ));
    }

    #[tokio::test]
    async fn list_by_state_and_population() {
        let (_, layer) = layer(false).await;
        with_parents(&layer).await;
        let repo = layer.cities();
        for (name, pop) in [("Chicago", 2_700_000), ("Springfield", 116_000), ("Peoria", 113_000)] {
            repo.create(&payload(json!({
                "name": name, "state_code": "IL", "country_code": "US", "population": pop
            })))
            .await
            .unwrap();
        }
        let filter = CityFilter {
            state_code: Some("IL".into()),
            max_population: Some(200_000),
            ..Default::default()
        };
        let page = repo
            .list(&filter, Pagination::default(), Some("name"))
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Peoria", "Springfield"]);
    }
}
