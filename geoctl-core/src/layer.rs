//! Process-wide data layer
//!
//! Created once at startup, shut down at exit. Owns the connection manager and
//! the entity caches; repositories borrow from it per call.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::cache::{CacheStats, EntityCache};
use crate::config::DbConfig;
use crate::connection::{ConnectionManager, Connector};
use crate::error::Result;
use crate::models::{City, CityKey, Country, CountryCode, State, StateKey};
use crate::repos::{CityRepo, CountryRepo, StateRepo, CITIES, COUNTRIES, STATES};
use crate::store::{MemoryConnector, MemoryStore, MongoConnector};

/// Unique indexes backing the primary lookup keys
const INDEXES: &[(&str, &[&str])] = &[
    (COUNTRIES, &["code"]),
    (STATES, &["country_code", "state_code"]),
    (CITIES, &["state_code", "name"]),
];

/// Cache counters per entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheReport {
    pub countries: CacheStats,
    pub states: CacheStats,
    pub cities: CacheStats,
}

pub struct DataLayer {
    conn: ConnectionManager,
    countries: EntityCache<CountryCode, Country>,
    states: EntityCache<StateKey, State>,
    cities: EntityCache<CityKey, City>,
    city_state_fallback: bool,
}

impl DataLayer {
    pub fn new(connector: Arc<dyn Connector>, config: &DbConfig) -> Self {
        Self {
            conn: ConnectionManager::new(connector, config.op_timeout),
            countries: EntityCache::new(COUNTRIES),
            states: EntityCache::new(STATES),
            cities: EntityCache::new(CITIES),
            city_state_fallback: config.city_state_fallback,
        }
    }

    pub fn mongo(config: &DbConfig) -> Self {
        Self::new(Arc::new(MongoConnector::new(config)), config)
    }

    pub fn in_memory(store: Arc<MemoryStore>, config: &DbConfig) -> Self {
        Self::new(Arc::new(MemoryConnector::new(store)), config)
    }

    /// Connect and make sure the unique indexes exist.
    pub async fn start(&self) -> Result<()> {
        self.conn.connect().await?;
        self.ensure_indexes().await?;
        info!(target = %self.conn.describe(), "data layer ready");
        Ok(())
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        for (collection, fields) in INDEXES {
            self.conn
                .ensure_connection(|store| async move {
                    store.ensure_unique_index(collection, fields).await
                })
                .await?;
        }
        Ok(())
    }

    pub fn countries(&self) -> CountryRepo<'_> {
        CountryRepo::new(&self.conn, &self.countries)
    }

    pub fn states(&self) -> StateRepo<'_> {
        StateRepo::new(&self.conn, &self.states, self.countries())
    }

    pub fn cities(&self) -> CityRepo<'_> {
        CityRepo::new(
            &self.conn,
            &self.cities,
            self.countries(),
            self.states(),
            self.city_state_fallback,
        )
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.conn
    }

    pub fn country_cache(&self) -> &EntityCache<CountryCode, Country> {
        &self.countries
    }

    pub fn state_cache(&self) -> &EntityCache<StateKey, State> {
        &self.states
    }

    /// Readiness: a full ping through the connection manager.
    pub async fn ready(&self) -> Result<()> {
        self.conn.ping().await
    }

    pub fn cache_report(&self) -> CacheReport {
        CacheReport {
            countries: self.countries.stats(),
            states: self.states.stats(),
            cities: self.cities.stats(),
        }
    }

    /// Drop the database handle and empty the caches.
    pub async fn shutdown(&self) {
        self.conn.shutdown().await;
        self.countries.clear();
        self.states.clear();
        self.cities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use serde_json::json;

    #[tokio::test]
    async fn start_creates_indexes_and_connects() {
        let store = MemoryStore::new();
        let layer = DataLayer::in_memory(Arc::clone(&store), &DbConfig::default());
        layer.start().await.unwrap();
        assert_eq!(
            layer.connection().state().await,
            ConnectionState::Connected
        );
        layer.ready().await.unwrap();
    }

    #[tokio::test]
    async fn start_fails_when_database_down() {
        let store = MemoryStore::new();
        store.set_online(false);
        let layer = DataLayer::in_memory(store, &DbConfig::default());
        assert!(layer.start().await.is_err());
    }

    #[tokio::test]
    async fn shutdown_clears_caches() {
        let store = MemoryStore::new();
        let layer = DataLayer::in_memory(store, &DbConfig::default());
        layer.start().await.unwrap();
        let p = json!({"code": "US", "name": "United States"});
        layer
            .countries()
            .create(p.as_object().unwrap())
            .await
            .unwrap();
        assert_eq!(layer.cache_report().countries.entries, 1);

        layer.shutdown().await;
        assert_eq!(layer.cache_report().countries.entries, 0);
        assert_eq!(
            layer.connection().state().await,
            ConnectionState::Disconnected
        );
    }
}
