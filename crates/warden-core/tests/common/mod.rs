#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use warden_core::{
    AdminDirectory, CleanupLedger, CoreConfig, EventSink, SessionArchive, SessionEngine,
    TenantCache,
};
use warden_store::StoreClient;
use warden_types::{ArchivedSession, ChatId, MessageId, TenantId, UserId};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn tenant() -> TenantId {
    TenantId::new("acme")
}

pub fn engine_over(
    store: StoreClient,
    archive: Arc<dyn SessionArchive>,
    config: CoreConfig,
) -> SessionEngine {
    let cache = TenantCache::new(store.clone(), config.local_cache_ttl);
    SessionEngine::new(store, cache, archive, config)
}

pub fn engine() -> (SessionEngine, Arc<MemoryArchive>) {
    init_tracing();
    let archive = Arc::new(MemoryArchive::default());
    let engine = engine_over(StoreClient::memory(), archive.clone(), CoreConfig::default());
    (engine, archive)
}

pub fn cleanup_ledger() -> CleanupLedger {
    init_tracing();
    CleanupLedger::new(StoreClient::memory(), &CoreConfig::default())
}

/// Archive collaborator that keeps every ledger it is handed.
#[derive(Default)]
pub struct MemoryArchive {
    pub sessions: Mutex<Vec<ArchivedSession>>,
}

#[async_trait]
impl SessionArchive for MemoryArchive {
    async fn archive_session(&self, session: &ArchivedSession) -> anyhow::Result<()> {
        self.sessions.lock().unwrap().push(session.clone());
        Ok(())
    }
}

/// Archive collaborator whose writes never get acknowledged.
pub struct FailingArchive;

#[async_trait]
impl SessionArchive for FailingArchive {
    async fn archive_session(&self, _session: &ArchivedSession) -> anyhow::Result<()> {
        anyhow::bail!("archive storage offline")
    }
}

/// Directory with a fixed admin list and a call counter; can be flipped into
/// a failing state to exercise degrade paths.
pub struct SwitchableDirectory {
    pub admins: Vec<UserId>,
    pub healthy: AtomicBool,
    pub calls: AtomicUsize,
}

impl SwitchableDirectory {
    pub fn new(admins: Vec<UserId>) -> Self {
        Self {
            admins,
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdminDirectory for SwitchableDirectory {
    async fn fetch_admins(
        &self,
        _tenant: &TenantId,
        _chat_id: ChatId,
    ) -> anyhow::Result<Vec<UserId>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.healthy.load(Ordering::SeqCst) {
            anyhow::bail!("platform api unreachable");
        }
        Ok(self.admins.clone())
    }
}

/// Event sink that records every payload and hands out increasing ids.
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<(ChatId, String)>>,
    pub deleted: Mutex<Vec<(ChatId, MessageId)>>,
    next_id: AtomicI64,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send_event(&self, chat_id: ChatId, payload: &str) -> anyhow::Result<MessageId> {
        self.sent.lock().unwrap().push((chat_id, payload.to_string()));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn delete_event(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<()> {
        self.deleted.lock().unwrap().push((chat_id, message_id));
        Ok(())
    }
}

/// Event sink for a chat the bot can no longer post to.
pub struct DeadSink;

#[async_trait]
impl EventSink for DeadSink {
    async fn send_event(&self, _chat_id: ChatId, _payload: &str) -> anyhow::Result<MessageId> {
        anyhow::bail!("bot was removed from chat")
    }

    async fn delete_event(&self, _chat_id: ChatId, _message_id: MessageId) -> anyhow::Result<()> {
        anyhow::bail!("bot was removed from chat")
    }
}
