use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use warden_store::StoreClient;
use warden_types::{
    ArchivedSession, EngineError, GroupId, IgnoreReason, IngestOutcome, MessageRecord,
    MultiLinkUser, Offender, Phase, Result, StartOutcome, TenantId, UserId,
};

use crate::cache::TenantCache;
use crate::config::CoreConfig;
use crate::handles::{self, ResubmissionRuling};
use crate::keys;
use crate::ports::SessionArchive;

pub(crate) const PHASE_KIND: &str = "phase";

/// First-submitter claim for a canonical handle. Written with an atomic
/// set-if-absent, so exactly one submission per session wins first-seen even
/// when workers race.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HandleClaim {
    user_id: UserId,
    display_name: String,
    claimed_at: DateTime<Utc>,
}

/// Owns the per-(tenant, group) phase state machine and message ledger.
///
/// All state lives in the shared store; instances of this engine are cheap
/// handles that any number of concurrent webhook workers may hold.
#[derive(Clone)]
pub struct SessionEngine {
    store: StoreClient,
    cache: TenantCache,
    archive: Arc<dyn SessionArchive>,
    config: CoreConfig,
}

impl SessionEngine {
    pub fn new(
        store: StoreClient,
        cache: TenantCache,
        archive: Arc<dyn SessionArchive>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            cache,
            archive,
            config,
        }
    }

    pub(crate) fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &StoreClient {
        &self.store
    }

    /// Begin a collection session for a group. Idempotent: a second start
    /// while one is active reports `AlreadyStarted` instead of failing.
    pub async fn start_session(&self, tenant: &TenantId, group: GroupId) -> Result<StartOutcome> {
        let ns = keys::session_key(tenant, group);
        let created = self
            .store
            .set_field_if_absent(&ns, "phase", Phase::Collecting.as_str().as_bytes())
            .await?;
        if !created {
            debug!("session already active for tenant {} group {}", tenant, group);
            return Ok(StartOutcome::AlreadyStarted);
        }

        let session_uid = Uuid::new_v4();
        let started_at = Utc::now();
        self.store
            .set_field(&ns, "session_uid", session_uid.to_string().as_bytes())
            .await?;
        self.store
            .set_field(&ns, "started_at", started_at.to_rfc3339().as_bytes())
            .await?;
        self.store.expire(&ns, self.config.session_ttl).await?;
        self.cache_phase(tenant, group, Phase::Collecting).await;

        info!(
            "session {} started for tenant {} group {}",
            session_uid, tenant, group
        );
        Ok(StartOutcome::Started)
    }

    /// Move a collecting session into verification. Any other starting phase
    /// is a caller logic error.
    pub async fn advance_phase(&self, tenant: &TenantId, group: GroupId) -> Result<()> {
        let ns = keys::session_key(tenant, group);
        let current = self
            .load_phase(tenant, group)
            .await?
            .ok_or(EngineError::NotFound)?;
        if current != Phase::Collecting {
            return Err(EngineError::InvalidPhaseTransition {
                from: current,
                to: Phase::Verifying,
            });
        }
        self.store
            .set_field(&ns, "phase", Phase::Verifying.as_str().as_bytes())
            .await?;
        self.cache_phase(tenant, group, Phase::Verifying).await;
        info!("tenant {} group {} now verifying", tenant, group);
        Ok(())
    }

    /// Close a session: mark it closed, archive the full ledger, then clear
    /// hot state. Hot state is only cleared once the archive write is
    /// acknowledged; if archiving fails the session stays `closed` with its
    /// ledger intact and this call can be retried.
    pub async fn close_session(
        &self,
        tenant: &TenantId,
        group: GroupId,
    ) -> Result<ArchivedSession> {
        let ns = keys::session_key(tenant, group);
        let current = self
            .load_phase(tenant, group)
            .await?
            .ok_or(EngineError::NotFound)?;
        if current != Phase::Closed {
            // stops concurrent ingestion before the ledger snapshot
            self.store
                .set_field(&ns, "phase", Phase::Closed.as_str().as_bytes())
                .await?;
        }
        self.cache_phase(tenant, group, Phase::Closed).await;

        let session_uid = self
            .store
            .get_field(&ns, "session_uid")
            .await?
            .and_then(|b| String::from_utf8(b).ok())
            .and_then(|s| s.parse::<Uuid>().ok())
            .unwrap_or_else(|| {
                warn!("session for tenant {} group {} has no uid", tenant, group);
                Uuid::nil()
            });
        let started_at = self
            .store
            .get_field(&ns, "started_at")
            .await?
            .and_then(|b| String::from_utf8(b).ok())
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let records = self.load_ledger(tenant, group).await?;
        let archived = ArchivedSession {
            tenant: tenant.clone(),
            group_id: group,
            session_uid,
            started_at,
            closed_at: Utc::now(),
            records,
        };

        self.archive
            .archive_session(&archived)
            .await
            .map_err(|e| EngineError::ArchiveFailed(e.to_string()))?;

        // the archive write is acknowledged; now hot state may go
        let users: BTreeSet<UserId> = archived.records.iter().map(|r| r.user_id).collect();
        for user_id in users {
            self.store
                .delete(&keys::user_index_key(tenant, group, user_id))
                .await?;
        }
        self.store.delete(&keys::ledger_key(tenant, group)).await?;
        self.store.delete(&keys::handles_key(tenant, group)).await?;
        self.store.delete(&keys::sr_key(tenant, group)).await?;
        self.store.delete(&ns).await?;
        if let Err(e) = self
            .cache
            .invalidate(tenant, PHASE_KIND, &group.to_string())
            .await
        {
            warn!("phase cache invalidation failed after close: {}", e);
        }

        info!(
            "session {} closed for tenant {} group {} ({} records archived)",
            archived.session_uid,
            tenant,
            group,
            archived.records.len()
        );
        Ok(archived)
    }

    /// Ingest one submitted link. Outside a collecting session, or for text
    /// that is not an identity link, this is a silent no-op reported through
    /// `IngestOutcome::Ignored`.
    ///
    /// Safe under concurrent ingestion for the same group: the sequence
    /// number comes from an atomic counter and each record lands in its own
    /// field, so racing workers never clobber each other.
    pub async fn ingest_link(
        &self,
        tenant: &TenantId,
        group: GroupId,
        user_id: UserId,
        display_name: &str,
        link: &str,
    ) -> Result<IngestOutcome> {
        match self.get_phase(tenant, group).await {
            None => return Ok(IngestOutcome::Ignored(IgnoreReason::NoSession)),
            Some(Phase::Closed) => return Ok(IngestOutcome::Ignored(IgnoreReason::SessionClosed)),
            Some(Phase::Verifying) => {
                return Ok(IngestOutcome::Ignored(IgnoreReason::NotCollecting))
            }
            Some(Phase::Collecting) => {}
        }

        let Some(handle) = handles::extract_handle(link, &self.config.link_hosts) else {
            return Ok(IngestOutcome::Ignored(IgnoreReason::NotALink));
        };

        let handles_ns = keys::handles_key(tenant, group);
        let claim = HandleClaim {
            user_id,
            display_name: display_name.to_string(),
            claimed_at: Utc::now(),
        };
        let first_seen = self
            .store
            .set_field_if_absent(&handles_ns, &handle, &serde_json::to_vec(&claim)?)
            .await?;

        let mut fraud = false;
        let mut offenders = Vec::new();
        if !first_seen {
            let submitters = self.handle_submitters(tenant, group, &handle).await?;
            match handles::resubmission_ruling(&submitters, user_id, self.config.one_link_per_user)
            {
                ResubmissionRuling::Allowed => {}
                ResubmissionRuling::RejectedByPolicy => {
                    debug!(
                        "rejected resubmission of @{} by user {} in group {}",
                        handle, user_id, group
                    );
                    return Ok(IngestOutcome::DuplicateSubmission { handle });
                }
                ResubmissionRuling::Fraud => {
                    fraud = true;
                    offenders = submitters;
                    offenders.push(Offender {
                        user_id,
                        display_name: display_name.to_string(),
                    });
                }
            }
        }

        let session_ns = keys::session_key(tenant, group);
        let seq = self.store.incr_field(&session_ns, "seq").await? as u64;
        let record = MessageRecord {
            seq,
            user_id,
            display_name: display_name.to_string(),
            link: link.to_string(),
            handle: handle.clone(),
            verified: false,
            fraud,
            submitted_at: Utc::now(),
        };

        let ledger_ns = keys::ledger_key(tenant, group);
        let user_ns = keys::user_index_key(tenant, group, user_id);
        self.store
            .set_field(&ledger_ns, &seq.to_string(), &serde_json::to_vec(&record)?)
            .await?;
        self.store
            .set_field(&user_ns, &seq.to_string(), b"1")
            .await?;
        self.store.expire(&ledger_ns, self.config.session_ttl).await?;
        self.store.expire(&user_ns, self.config.session_ttl).await?;
        self.store
            .expire(&handles_ns, self.config.session_ttl)
            .await?;

        if fraud {
            warn!(
                "handle @{} claimed by multiple users in tenant {} group {}",
                handle, tenant, group
            );
            return Ok(IngestOutcome::FraudAlert {
                handle,
                offenders,
                record,
            });
        }
        debug!("recorded link #{} (@{}) in group {}", seq, handle, group);
        Ok(IngestOutcome::Accepted(record))
    }

    /// Current phase, or `None` when no session exists. Cache-first; store
    /// read failures degrade to "no session", the safe default for a
    /// moderation decision.
    pub async fn get_phase(&self, tenant: &TenantId, group: GroupId) -> Option<Phase> {
        if let Some(phase) = self
            .cache
            .get::<Phase>(tenant, PHASE_KIND, &group.to_string())
            .await
        {
            return Some(phase);
        }
        match self.load_phase(tenant, group).await {
            Ok(Some(phase)) => {
                self.cache_phase(tenant, group, phase).await;
                Some(phase)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    "phase read for tenant {} group {} degraded to no-session: {}",
                    tenant, group, e
                );
                None
            }
        }
    }

    /// All records not yet verified, in sequence order.
    pub async fn query_unverified(
        &self,
        tenant: &TenantId,
        group: GroupId,
    ) -> Result<Vec<MessageRecord>> {
        Ok(self
            .load_ledger(tenant, group)
            .await?
            .into_iter()
            .filter(|r| !r.verified)
            .collect())
    }

    /// All records submitted by one user, in sequence order. Bounded by the
    /// user's own record count via the per-user index.
    pub async fn query_by_user(
        &self,
        tenant: &TenantId,
        group: GroupId,
        user_id: UserId,
    ) -> Result<Vec<MessageRecord>> {
        self.user_records(tenant, group, user_id).await
    }

    /// Number of distinct submitters in the session.
    pub async fn participant_count(&self, tenant: &TenantId, group: GroupId) -> Result<usize> {
        let users: BTreeSet<UserId> = self
            .load_ledger(tenant, group)
            .await?
            .iter()
            .map(|r| r.user_id)
            .collect();
        Ok(users.len())
    }

    /// Users who submitted more than one link, with everything they posted.
    pub async fn multi_link_users(
        &self,
        tenant: &TenantId,
        group: GroupId,
    ) -> Result<Vec<MultiLinkUser>> {
        let mut grouped: Vec<MultiLinkUser> = Vec::new();
        for record in self.load_ledger(tenant, group).await? {
            match grouped.iter_mut().find(|u| u.user_id == record.user_id) {
                Some(user) => user.links.push(record.link),
                None => grouped.push(MultiLinkUser {
                    user_id: record.user_id,
                    display_name: record.display_name,
                    links: vec![record.link],
                }),
            }
        }
        grouped.retain(|u| u.links.len() > 1);
        Ok(grouped)
    }

    async fn cache_phase(&self, tenant: &TenantId, group: GroupId, phase: Phase) {
        if let Err(e) = self
            .cache
            .set(
                tenant,
                PHASE_KIND,
                &group.to_string(),
                &phase,
                self.config.phase_cache_ttl,
            )
            .await
        {
            warn!("phase cache write-through failed: {}", e);
        }
    }

    async fn load_phase(&self, tenant: &TenantId, group: GroupId) -> Result<Option<Phase>> {
        let ns = keys::session_key(tenant, group);
        let Some(bytes) = self.store.get_field(&ns, "phase").await? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes).into_owned();
        match Phase::parse(&text) {
            Some(phase) => Ok(Some(phase)),
            None => Err(EngineError::Internal(format!("unknown phase {text:?}"))),
        }
    }

    /// The full ledger in sequence order. Corrupt records are skipped with a
    /// warning rather than poisoning every read.
    pub(crate) async fn load_ledger(
        &self,
        tenant: &TenantId,
        group: GroupId,
    ) -> Result<Vec<MessageRecord>> {
        let ns = keys::ledger_key(tenant, group);
        let mut records = Vec::new();
        for (field, bytes) in self.store.get_all(&ns).await? {
            match serde_json::from_slice::<MessageRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "skipping corrupt ledger record {} in group {}: {}",
                    field, group, e
                ),
            }
        }
        records.sort_by_key(|r| r.seq);
        Ok(records)
    }

    pub(crate) async fn user_records(
        &self,
        tenant: &TenantId,
        group: GroupId,
        user_id: UserId,
    ) -> Result<Vec<MessageRecord>> {
        let user_ns = keys::user_index_key(tenant, group, user_id);
        let mut seqs: Vec<u64> = self
            .store
            .get_all(&user_ns)
            .await?
            .into_iter()
            .filter_map(|(field, _)| field.parse().ok())
            .collect();
        seqs.sort_unstable();

        let ledger_ns = keys::ledger_key(tenant, group);
        let mut records = Vec::with_capacity(seqs.len());
        for seq in seqs {
            if let Some(bytes) = self.store.get_field(&ledger_ns, &seq.to_string()).await? {
                match serde_json::from_slice::<MessageRecord>(&bytes) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(
                        "skipping corrupt ledger record {} in group {}: {}",
                        seq, group, e
                    ),
                }
            }
        }
        Ok(records)
    }

    /// Everyone who submitted `handle` so far: the first-submitter claim,
    /// then any further ledger entries. Only consulted on the rare duplicate
    /// path; the common case is the O(1) registry check.
    async fn handle_submitters(
        &self,
        tenant: &TenantId,
        group: GroupId,
        handle: &str,
    ) -> Result<Vec<Offender>> {
        let mut offenders: Vec<Offender> = Vec::new();
        if let Some(bytes) = self
            .store
            .get_field(&keys::handles_key(tenant, group), handle)
            .await?
        {
            match serde_json::from_slice::<HandleClaim>(&bytes) {
                Ok(claim) => offenders.push(Offender {
                    user_id: claim.user_id,
                    display_name: claim.display_name,
                }),
                Err(e) => warn!("unreadable handle claim for @{}: {}", handle, e),
            }
        }
        for record in self.load_ledger(tenant, group).await? {
            if record.handle == handle && !offenders.iter().any(|o| o.user_id == record.user_id) {
                offenders.push(Offender {
                    user_id: record.user_id,
                    display_name: record.display_name,
                });
            }
        }
        Ok(offenders)
    }
}
