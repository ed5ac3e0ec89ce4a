use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use warden_store::StoreClient;
use warden_types::{ChatId, MessageId, Result, TenantId};

use crate::config::CoreConfig;
use crate::keys;

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub deleted: usize,
    /// Ids whose deletion failed (already gone, permissions); dropped, not
    /// retried.
    pub dropped: usize,
    /// Live count read once before draining began. Display only; not
    /// revalidated against concurrent additions.
    pub total_at_start: usize,
}

/// Per-(tenant, chat) set of outstanding bot-emitted message ids.
///
/// Consumption is an atomic pop in the shared store, so two workers draining
/// the same chat at once each delete a disjoint share of the ids — exactly
/// once per id, never twice.
#[derive(Clone)]
pub struct CleanupLedger {
    store: StoreClient,
    default_ttl: Duration,
    progress_every: usize,
}

impl CleanupLedger {
    pub fn new(store: StoreClient, config: &CoreConfig) -> Self {
        Self {
            store,
            default_ttl: config.tracked_message_ttl,
            progress_every: config.progress_every.max(1),
        }
    }

    /// Remember a message the bot just emitted so a later cleanup can delete
    /// it. Untracked automatically once the TTL passes.
    pub async fn track(
        &self,
        tenant: &TenantId,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<()> {
        self.track_with_ttl(tenant, chat_id, message_id, self.default_ttl)
            .await
    }

    pub async fn track_with_ttl(
        &self,
        tenant: &TenantId,
        chat_id: ChatId,
        message_id: MessageId,
        ttl: Duration,
    ) -> Result<()> {
        self.store
            .add_to_set(
                &keys::tracked_key(tenant, chat_id),
                &message_id.to_string(),
                ttl,
            )
            .await?;
        Ok(())
    }

    /// Live tracked count, for operator display.
    pub async fn outstanding(&self, tenant: &TenantId, chat_id: ChatId) -> Result<usize> {
        Ok(self
            .store
            .set_len(&keys::tracked_key(tenant, chat_id))
            .await?)
    }

    /// Pop-and-delete every tracked id. Deletion failures are dropped
    /// without retry. Safe to run concurrently with itself for the same
    /// chat; the popped sets are disjoint.
    pub async fn drain_and_delete<D, Fut>(
        &self,
        tenant: &TenantId,
        chat_id: ChatId,
        delete: D,
    ) -> Result<DrainReport>
    where
        D: FnMut(MessageId) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.drain_and_delete_with_progress(tenant, chat_id, delete, |_, _| {})
            .await
    }

    /// Like `drain_and_delete`, reporting (deleted, total-at-start) at a
    /// bounded interval rather than on every deletion.
    pub async fn drain_and_delete_with_progress<D, Fut, P>(
        &self,
        tenant: &TenantId,
        chat_id: ChatId,
        mut delete: D,
        mut progress: P,
    ) -> Result<DrainReport>
    where
        D: FnMut(MessageId) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
        P: FnMut(usize, usize),
    {
        let ns = keys::tracked_key(tenant, chat_id);
        let total_at_start = self.store.set_len(&ns).await?;
        let mut deleted = 0usize;
        let mut dropped = 0usize;

        while let Some(member) = self.store.pop_from_set(&ns).await? {
            let Ok(message_id) = member.parse::<MessageId>() else {
                warn!("dropping malformed tracked id {:?} in chat {}", member, chat_id);
                dropped += 1;
                continue;
            };
            match delete(message_id).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    dropped += 1;
                    debug!(
                        "delete of message {} in chat {} failed, dropping: {}",
                        message_id, chat_id, e
                    );
                }
            }
            if (deleted + dropped) % self.progress_every == 0 {
                progress(deleted, total_at_start);
            }
        }

        info!(
            "cleanup for tenant {} chat {}: {} deleted, {} dropped",
            tenant, chat_id, deleted, dropped
        );
        Ok(DrainReport {
            deleted,
            dropped,
            total_at_start,
        })
    }

    /// Forget everything tracked for a chat without deleting anything. Used
    /// when a cleanup is abandoned.
    pub async fn clear(&self, tenant: &TenantId, chat_id: ChatId) -> Result<()> {
        self.store
            .delete(&keys::tracked_key(tenant, chat_id))
            .await?;
        Ok(())
    }
}
