//! Interfaces to external collaborators. The core only ever reports fraud
//! alerts and verification outcomes, archives closed sessions, and asks who
//! administers a chat — everything else about the platform stays outside.

use async_trait::async_trait;

use warden_types::{ArchivedSession, ChatId, MessageId, TenantId, UserId};

/// Outgoing message dispatch. Returned ids are recorded in the cleanup
/// ledger so the emitted messages can be bulk-deleted later.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send_event(&self, chat_id: ChatId, payload: &str) -> anyhow::Result<MessageId>;

    async fn delete_event(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<()>;
}

/// Durable long-term storage for finished session ledgers.
#[async_trait]
pub trait SessionArchive: Send + Sync {
    async fn archive_session(&self, session: &ArchivedSession) -> anyhow::Result<()>;
}

/// Authoritative admin list for a chat, queried on cache misses.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    async fn fetch_admins(&self, tenant: &TenantId, chat_id: ChatId)
        -> anyhow::Result<Vec<UserId>>;
}
