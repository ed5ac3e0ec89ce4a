pub mod memory;
pub mod redis;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Failures of the shared store. No retries happen at this layer; retry
/// policy belongs to callers, who treat reads as misses and surface writes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("store state corrupted: {0}")]
    Internal(String),
}

impl From<StoreError> for warden_types::EngineError {
    fn from(err: StoreError) -> Self {
        warden_types::EngineError::StoreUnavailable(err.to_string())
    }
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Thin client over an external keyed store.
///
/// All operations are atomic at the field/member level and safe under
/// concurrent callers from different processes. Every networked call is
/// bounded by a short timeout so handlers degrade instead of hanging.
#[derive(Clone)]
pub struct StoreClient {
    backend: Backend,
    timeout: Duration,
}

#[derive(Clone)]
enum Backend {
    Memory(MemoryStore),
    Redis(RedisStore),
}

impl StoreClient {
    /// Process-local store. Clones share state; used by tests and
    /// single-node deployments.
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory(MemoryStore::default()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Store backed by a Redis-compatible server.
    pub fn redis(url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            backend: Backend::Redis(RedisStore::connect(url)?),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }

    pub async fn get_field(&self, ns: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match &self.backend {
            Backend::Memory(m) => m.get_field(ns, field),
            Backend::Redis(r) => self.bounded(r.get_field(ns, field)).await,
        }
    }

    pub async fn set_field(&self, ns: &str, field: &str, value: &[u8]) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Memory(m) => m.set_field(ns, field, value),
            Backend::Redis(r) => self.bounded(r.set_field(ns, field, value)).await,
        }
    }

    /// Atomic first-writer-wins. Returns true if this call created the field.
    pub async fn set_field_if_absent(
        &self,
        ns: &str,
        field: &str,
        value: &[u8],
    ) -> Result<bool, StoreError> {
        match &self.backend {
            Backend::Memory(m) => m.set_field_if_absent(ns, field, value),
            Backend::Redis(r) => self.bounded(r.set_field_if_absent(ns, field, value)).await,
        }
    }

    pub async fn delete_field(&self, ns: &str, field: &str) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Memory(m) => m.delete_field(ns, field),
            Backend::Redis(r) => self.bounded(r.delete_field(ns, field)).await,
        }
    }

    /// Atomically increment a numeric field by one, returning the new value.
    pub async fn incr_field(&self, ns: &str, field: &str) -> Result<i64, StoreError> {
        match &self.backend {
            Backend::Memory(m) => m.incr_field(ns, field),
            Backend::Redis(r) => self.bounded(r.incr_field(ns, field)).await,
        }
    }

    /// All fields of a namespace, unordered.
    pub async fn get_all(&self, ns: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        match &self.backend {
            Backend::Memory(m) => m.get_all(ns),
            Backend::Redis(r) => self.bounded(r.get_all(ns)).await,
        }
    }

    /// Drop a whole namespace.
    pub async fn delete(&self, ns: &str) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Memory(m) => m.delete(ns),
            Backend::Redis(r) => self.bounded(r.delete(ns)).await,
        }
    }

    /// Add a member to a scored set; the member expires on its own after
    /// `ttl` if never popped.
    pub async fn add_to_set(&self, ns: &str, member: &str, ttl: Duration) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Memory(m) => m.add_to_set(ns, member, ttl),
            Backend::Redis(r) => self.bounded(r.add_to_set(ns, member, ttl)).await,
        }
    }

    /// Atomically remove and return one live member. Two concurrent callers
    /// never receive the same member; expired members are discarded.
    pub async fn pop_from_set(&self, ns: &str) -> Result<Option<String>, StoreError> {
        match &self.backend {
            Backend::Memory(m) => m.pop_from_set(ns),
            Backend::Redis(r) => self.bounded(r.pop_from_set(ns)).await,
        }
    }

    /// Count of live (non-expired) members.
    pub async fn set_len(&self, ns: &str) -> Result<usize, StoreError> {
        match &self.backend {
            Backend::Memory(m) => m.set_len(ns),
            Backend::Redis(r) => self.bounded(r.set_len(ns)).await,
        }
    }

    /// Whole-namespace TTL; hot session state has a lifecycle of hours, not
    /// a durable event log.
    pub async fn expire(&self, ns: &str, ttl: Duration) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Memory(m) => m.expire(ns, ttl),
            Backend::Redis(r) => self.bounded(r.expire(ns, ttl)).await,
        }
    }
}
