use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::StoreError;

/// Process-local store backend.
///
/// Clones share one underlying map, so every component holding a clone of
/// the same client sees the same state — mirroring what a shared server
/// gives separate processes. Expiry uses the same explicit-timestamp scheme
/// as the remote backend.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    hashes: HashMap<String, HashMap<String, Vec<u8>>>,
    /// member -> expires_at (epoch millis)
    sets: HashMap<String, BTreeMap<String, i64>>,
    /// namespace -> expires_at (epoch millis)
    deadlines: HashMap<String, i64>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl Inner {
    /// Drop the namespace if its whole-namespace TTL has passed.
    fn evict_if_expired(&mut self, ns: &str) {
        if let Some(&deadline) = self.deadlines.get(ns) {
            if deadline <= now_ms() {
                self.hashes.remove(ns);
                self.sets.remove(ns);
                self.deadlines.remove(ns);
            }
        }
    }
}

impl MemoryStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Internal(format!("store lock poisoned: {e}")))
    }

    pub fn get_field(&self, ns: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut inner = self.lock()?;
        inner.evict_if_expired(ns);
        Ok(inner.hashes.get(ns).and_then(|h| h.get(field)).cloned())
    }

    pub fn set_field(&self, ns: &str, field: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.evict_if_expired(ns);
        inner
            .hashes
            .entry(ns.to_string())
            .or_default()
            .insert(field.to_string(), value.to_vec());
        Ok(())
    }

    pub fn set_field_if_absent(
        &self,
        ns: &str,
        field: &str,
        value: &[u8],
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        inner.evict_if_expired(ns);
        let hash = inner.hashes.entry(ns.to_string()).or_default();
        if hash.contains_key(field) {
            return Ok(false);
        }
        hash.insert(field.to_string(), value.to_vec());
        Ok(true)
    }

    pub fn delete_field(&self, ns: &str, field: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.evict_if_expired(ns);
        if let Some(hash) = inner.hashes.get_mut(ns) {
            hash.remove(field);
        }
        Ok(())
    }

    pub fn incr_field(&self, ns: &str, field: &str) -> Result<i64, StoreError> {
        let mut inner = self.lock()?;
        inner.evict_if_expired(ns);
        let hash = inner.hashes.entry(ns.to_string()).or_default();
        let current = match hash.get(field) {
            Some(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| {
                    StoreError::Internal(format!("non-numeric counter at {ns}/{field}"))
                })?,
            None => 0,
        };
        let next = current + 1;
        hash.insert(field.to_string(), next.to_string().into_bytes());
        Ok(next)
    }

    pub fn get_all(&self, ns: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let mut inner = self.lock()?;
        inner.evict_if_expired(ns);
        Ok(inner
            .hashes
            .get(ns)
            .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    pub fn delete(&self, ns: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.hashes.remove(ns);
        inner.sets.remove(ns);
        inner.deadlines.remove(ns);
        Ok(())
    }

    pub fn add_to_set(&self, ns: &str, member: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.evict_if_expired(ns);
        let expires_at = now_ms() + ttl.as_millis() as i64;
        inner
            .sets
            .entry(ns.to_string())
            .or_default()
            .insert(member.to_string(), expires_at);
        Ok(())
    }

    pub fn pop_from_set(&self, ns: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.lock()?;
        inner.evict_if_expired(ns);
        let now = now_ms();
        let Some(set) = inner.sets.get_mut(ns) else {
            return Ok(None);
        };
        while let Some(member) = set.keys().next().cloned() {
            let expires_at = set.remove(&member).unwrap_or(0);
            if expires_at > now {
                return Ok(Some(member));
            }
            // expired, keep popping
        }
        Ok(None)
    }

    pub fn set_len(&self, ns: &str) -> Result<usize, StoreError> {
        let mut inner = self.lock()?;
        inner.evict_if_expired(ns);
        let now = now_ms();
        Ok(inner
            .sets
            .get(ns)
            .map(|s| s.values().filter(|&&exp| exp > now).count())
            .unwrap_or(0))
    }

    pub fn expire(&self, ns: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let deadline = now_ms() + ttl.as_millis() as i64;
        inner.deadlines.insert(ns.to_string(), deadline);
        Ok(())
    }
}
