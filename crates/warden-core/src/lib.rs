pub mod admins;
pub mod cache;
pub mod cleanup;
pub mod config;
pub mod engine;
pub mod handles;
mod keys;
pub mod notify;
pub mod ports;
mod verify;

pub use admins::AdminRoster;
pub use cache::TenantCache;
pub use cleanup::{CleanupLedger, DrainReport};
pub use config::CoreConfig;
pub use engine::SessionEngine;
pub use notify::Notifier;
pub use ports::{AdminDirectory, EventSink, SessionArchive};

use warden_store::{StoreClient, StoreError};

/// Open the shared store named by the config: a Redis-compatible server when
/// `store_url` is set, a process-local store otherwise.
pub fn open_store(config: &CoreConfig) -> Result<StoreClient, StoreError> {
    let client = match &config.store_url {
        Some(url) => StoreClient::redis(url)?,
        None => StoreClient::memory(),
    };
    Ok(client.with_timeout(config.store_timeout))
}
