use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use warden_types::{ChatId, Result, TenantId, UserId};

use crate::cache::TenantCache;
use crate::config::CoreConfig;
use crate::ports::AdminDirectory;

const ADMIN_KIND: &str = "admins";

/// Cached membership authority for chats.
///
/// Admin lists are fetched lazily from the directory on first check per
/// chat, cached with a TTL, and invalidated explicitly when the
/// authoritative list changes. A cached empty list is a real answer
/// ("nobody administers this chat"); a fetch failure is not, and degrades
/// to "treat as not admin" without being cached.
#[derive(Clone)]
pub struct AdminRoster {
    cache: TenantCache,
    directory: Arc<dyn AdminDirectory>,
    ttl: Duration,
}

impl AdminRoster {
    pub fn new(cache: TenantCache, directory: Arc<dyn AdminDirectory>, config: &CoreConfig) -> Self {
        Self {
            cache,
            directory,
            ttl: config.admin_cache_ttl,
        }
    }

    /// Admin user ids for a chat, or `None` when the list could not be
    /// established right now.
    pub async fn admins(&self, tenant: &TenantId, chat_id: ChatId) -> Option<Vec<UserId>> {
        if let Some(list) = self
            .cache
            .get::<Vec<UserId>>(tenant, ADMIN_KIND, &chat_id.to_string())
            .await
        {
            return Some(list);
        }

        match self.directory.fetch_admins(tenant, chat_id).await {
            Ok(list) => {
                if let Err(e) = self
                    .cache
                    .set(tenant, ADMIN_KIND, &chat_id.to_string(), &list, self.ttl)
                    .await
                {
                    warn!("admin list for chat {} not cached: {}", chat_id, e);
                }
                Some(list)
            }
            Err(e) => {
                warn!(
                    "admin fetch for tenant {} chat {} failed, treating as not admin: {}",
                    tenant, chat_id, e
                );
                None
            }
        }
    }

    pub async fn is_admin(&self, tenant: &TenantId, chat_id: ChatId, user_id: UserId) -> bool {
        self.admins(tenant, chat_id)
            .await
            .map(|list| list.contains(&user_id))
            .unwrap_or(false)
    }

    /// Drop the cached list; the next check refetches from the directory.
    pub async fn invalidate(&self, tenant: &TenantId, chat_id: ChatId) -> Result<()> {
        self.cache
            .invalidate(tenant, ADMIN_KIND, &chat_id.to_string())
            .await
    }
}
