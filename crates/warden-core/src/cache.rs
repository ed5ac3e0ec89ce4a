use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use warden_store::StoreClient;
use warden_types::{Result, TenantId};

use crate::keys;

/// Local entries above this count trigger a stale sweep on insert.
const LOCAL_SWEEP_THRESHOLD: usize = 4096;

/// A value paired with its explicit expiry. The expiry travels with the
/// value through both cache tiers, so freshness is decided the same way
/// everywhere instead of per call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expiring<T> {
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

impl<T> Expiring<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn fresh(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

struct LocalEntry {
    value: Expiring<serde_json::Value>,
    /// The in-process tier re-checks the store past this point even if the
    /// value itself has a longer TTL; other workers may have replaced it.
    revalidate_at: DateTime<Utc>,
}

impl LocalEntry {
    fn usable(&self) -> bool {
        self.value.fresh() && Utc::now() < self.revalidate_at
    }
}

/// Two-tier read cache keyed by (tenant, entity kind, entity key).
///
/// The in-process map is consulted first, the shared store second. A value
/// is never served past its TTL in either tier, and this cache is never the
/// authority for anything it did not just write through.
#[derive(Clone)]
pub struct TenantCache {
    store: StoreClient,
    local_ttl: Duration,
    local: Arc<Mutex<HashMap<(TenantId, String, String), LocalEntry>>>,
}

impl TenantCache {
    pub fn new(store: StoreClient, local_ttl: Duration) -> Self {
        Self {
            store,
            local_ttl,
            local: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        tenant: &TenantId,
        kind: &str,
        key: &str,
    ) -> Option<T> {
        let map_key = (tenant.clone(), kind.to_string(), key.to_string());

        if let Some(envelope) = self.local_lookup(&map_key) {
            return decode(&envelope, tenant, kind, key);
        }

        let ns = keys::cache_key(tenant, kind);
        let bytes = match self.store.get_field(&ns, key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("cache read degraded to miss for {}/{}/{}: {}", tenant, kind, key, e);
                return None;
            }
        };

        let envelope: Expiring<serde_json::Value> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("discarding corrupt cache entry {}/{}/{}: {}", tenant, kind, key, e);
                return None;
            }
        };
        if !envelope.fresh() {
            return None;
        }

        self.local_insert(map_key, envelope.clone());
        decode(&envelope, tenant, kind, key)
    }

    /// Write-through: the shared store first, then the in-process tier.
    pub async fn set<T: Serialize>(
        &self,
        tenant: &TenantId,
        kind: &str,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let envelope = Expiring::new(serde_json::to_value(value)?, ttl);
        let ns = keys::cache_key(tenant, kind);
        self.store
            .set_field(&ns, key, &serde_json::to_vec(&envelope)?)
            .await?;
        self.local_insert(
            (tenant.clone(), kind.to_string(), key.to_string()),
            envelope,
        );
        Ok(())
    }

    /// Drop the entry from both tiers.
    pub async fn invalidate(&self, tenant: &TenantId, kind: &str, key: &str) -> Result<()> {
        if let Ok(mut map) = self.local.lock() {
            map.remove(&(tenant.clone(), kind.to_string(), key.to_string()));
        }
        let ns = keys::cache_key(tenant, kind);
        self.store.delete_field(&ns, key).await?;
        Ok(())
    }

    fn local_lookup(&self, map_key: &(TenantId, String, String)) -> Option<Expiring<serde_json::Value>> {
        let mut map = self.local.lock().ok()?;
        match map.get(map_key) {
            Some(entry) if entry.usable() => Some(entry.value.clone()),
            Some(_) => {
                map.remove(map_key);
                None
            }
            None => None,
        }
    }

    fn local_insert(&self, map_key: (TenantId, String, String), value: Expiring<serde_json::Value>) {
        let Ok(mut map) = self.local.lock() else {
            return;
        };
        if map.len() >= LOCAL_SWEEP_THRESHOLD {
            map.retain(|_, entry| entry.usable());
        }
        map.insert(
            map_key,
            LocalEntry {
                value,
                revalidate_at: Utc::now() + self.local_ttl,
            },
        );
    }
}

fn decode<T: DeserializeOwned>(
    envelope: &Expiring<serde_json::Value>,
    tenant: &TenantId,
    kind: &str,
    key: &str,
) -> Option<T> {
    match serde_json::from_value(envelope.value.clone()) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("cache entry {}/{}/{} has unexpected shape: {}", tenant, kind, key, e);
            None
        }
    }
}
