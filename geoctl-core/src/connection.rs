//! Connection manager
//!
//! Owns the single shared store handle and wraps every data-access call:
//! 1. Connect if there is no handle yet
//! 2. Ping; on a connection failure reconnect once
//! 3. Run the operation; on a connection failure reconnect once (if step 2
//!    did not already) and retry the operation once
//!
//! Reconnects are serialised through an async mutex. Each successful connect
//! bumps a generation counter, so a caller that saw generation `g` fail only
//! reconnects if nobody else has replaced `g` in the meantime.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{GeoError, Result};
use crate::store::{DocumentStore, StoreError};

/// Opens new store handles
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open and verify a fresh handle.
    async fn connect(&self) -> std::result::Result<Arc<dyn DocumentStore>, StoreError>;

    /// Target description for logs (credentials redacted).
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

struct Slot {
    store: Option<Arc<dyn DocumentStore>>,
    generation: u64,
}

type Handle = (Arc<dyn DocumentStore>, u64);

/// Single shared, self-healing database handle
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    slot: Mutex<Slot>,
    op_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, op_timeout: Duration) -> Self {
        Self {
            connector,
            slot: Mutex::new(Slot {
                store: None,
                generation: 0,
            }),
            op_timeout,
        }
    }

    pub fn describe(&self) -> String {
        self.connector.describe()
    }

    /// Establish the handle eagerly; a no-op when already connected.
    pub async fn connect(&self) -> Result<()> {
        self.reconnect(None).await.map(|_| ())
    }

    pub async fn state(&self) -> ConnectionState {
        match self.slot.lock().await.store {
            Some(_) => ConnectionState::Connected,
            None => ConnectionState::Disconnected,
        }
    }

    /// Number of successful connects so far.
    pub async fn generation(&self) -> u64 {
        self.slot.lock().await.generation
    }

    /// Round-trip to the database through the full check-and-retry path.
    pub async fn ping(&self) -> Result<()> {
        self.ensure_connection(|store| async move { store.ping().await })
            .await
    }

    /// Drop the handle. The next call reconnects.
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        if slot.store.take().is_some() {
            info!(target = %self.connector.describe(), "database handle closed");
        }
    }

    /// Run `op` against a live handle, reconnecting at most once.
    ///
    /// `op` may be invoked twice: once on the current handle and once more
    /// after a reconnect.
    pub async fn ensure_connection<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(Arc<dyn DocumentStore>) -> Fut,
        Fut: Future<Output = std::result::Result<T, StoreError>>,
    {
        let mut reconnected = false;
        let (mut store, mut generation) = match self.current().await {
            Some(handle) => handle,
            None => {
                reconnected = true;
                self.reconnect(None).await?
            }
        };

        let alive = match tokio::time::timeout(self.op_timeout, store.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.is_connection() => Err(e.to_string()),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => Err(format!("ping timed out after {:?}", self.op_timeout)),
        };
        if let Err(reason) = alive {
            if reconnected {
                return Err(GeoError::Connection { reason });
            }
            warn!(generation, %reason, "database connection lost");
            (store, generation) = self.reconnect(Some(generation)).await?;
            reconnected = true;
        }

        match tokio::time::timeout(self.op_timeout, op(Arc::clone(&store))).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.is_connection() && !reconnected => {
                warn!(generation, error = %e, "operation hit a dead connection, retrying once");
                let (store, _) = self.reconnect(Some(generation)).await?;
                match tokio::time::timeout(self.op_timeout, op(store)).await {
                    Ok(result) => result.map_err(GeoError::from),
                    Err(_) => Err(self.timeout_error()),
                }
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(self.timeout_error()),
        }
    }

    async fn current(&self) -> Option<Handle> {
        let slot = self.slot.lock().await;
        slot.store.as_ref().map(|s| (Arc::clone(s), slot.generation))
    }

    /// Replace the handle unless someone already replaced generation `stale`.
    ///
    /// `stale == None` means the caller saw no handle at all.
    async fn reconnect(&self, stale: Option<u64>) -> Result<Handle> {
        let mut slot = self.slot.lock().await;
        if let Some(store) = &slot.store {
            if stale != Some(slot.generation) {
                debug!(generation = slot.generation, "adopting handle from concurrent reconnect");
                return Ok((Arc::clone(store), slot.generation));
            }
        }
        slot.store = None;

        let target = self.connector.describe();
        let attempt = slot.generation + 1;
        match tokio::time::timeout(self.op_timeout, self.connector.connect()).await {
            Ok(Ok(store)) => {
                slot.generation = attempt;
                slot.store = Some(Arc::clone(&store));
                info!(%target, generation = attempt, "database connected");
                Ok((store, attempt))
            }
            Ok(Err(e)) => {
                warn!(%target, error = %e, "database connect failed");
                Err(GeoError::Connection {
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                warn!(%target, "database connect timed out");
                Err(GeoError::Connection {
                    reason: format!("connect timed out after {:?}", self.op_timeout),
                })
            }
        }
    }

    fn timeout_error(&self) -> GeoError {
        GeoError::Timeout {
            millis: u64::try_from(self.op_timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}
