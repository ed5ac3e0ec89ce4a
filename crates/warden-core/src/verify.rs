//! Screen-recording requests and verified marking, layered over the
//! session engine's ledger.

use std::collections::HashSet;

use chrono::Utc;
use tracing::info;

use warden_types::{
    GroupId, Phase, Result, TenantId, UnverifiedListing, UserId, VerifyOutcome, VerifyStatus,
};

use crate::engine::SessionEngine;
use crate::keys;

impl SessionEngine {
    /// Ask a user for a screen recording. Their records drop back to
    /// unverified so a verifier is forced to re-check them.
    pub async fn request_screen_recording(
        &self,
        tenant: &TenantId,
        group: GroupId,
        user_id: UserId,
    ) -> Result<()> {
        let sr_ns = keys::sr_key(tenant, group);
        self.store()
            .set_field(
                &sr_ns,
                &user_id.to_string(),
                Utc::now().to_rfc3339().as_bytes(),
            )
            .await?;
        self.store().expire(&sr_ns, self.config().session_ttl).await?;

        let ledger_ns = keys::ledger_key(tenant, group);
        for mut record in self.user_records(tenant, group, user_id).await? {
            if record.verified {
                record.verified = false;
                self.store()
                    .set_field(
                        &ledger_ns,
                        &record.seq.to_string(),
                        &serde_json::to_vec(&record)?,
                    )
                    .await?;
            }
        }
        info!(
            "screen recording requested from user {} in group {}",
            user_id, group
        );
        Ok(())
    }

    /// Withdraw a pending screen-recording request. Idempotent.
    pub async fn clear_screen_recording(
        &self,
        tenant: &TenantId,
        group: GroupId,
        user_id: UserId,
    ) -> Result<()> {
        self.store()
            .delete_field(&keys::sr_key(tenant, group), &user_id.to_string())
            .await?;
        Ok(())
    }

    /// Users with a screen-recording request still pending.
    pub async fn screen_recording_requests(
        &self,
        tenant: &TenantId,
        group: GroupId,
    ) -> Result<Vec<UserId>> {
        let mut users: Vec<UserId> = self
            .store()
            .get_all(&keys::sr_key(tenant, group))
            .await?
            .into_iter()
            .filter_map(|(field, _)| field.parse().ok())
            .collect();
        users.sort_unstable();
        Ok(users)
    }

    /// Mark every unverified record of a user verified. The scan is bounded
    /// by the user's own record count, not the whole ledger. Returns the
    /// handle of the first record this call flipped, or `None` when nothing
    /// changed.
    pub async fn mark_verified(
        &self,
        tenant: &TenantId,
        group: GroupId,
        user_id: UserId,
    ) -> Result<VerifyOutcome> {
        let records = self.user_records(tenant, group, user_id).await?;
        if records.is_empty() {
            return Ok(VerifyOutcome {
                handle: None,
                status: VerifyStatus::NoMessages,
            });
        }

        let ledger_ns = keys::ledger_key(tenant, group);
        let mut flipped: Option<String> = None;
        for mut record in records {
            if record.verified {
                continue;
            }
            record.verified = true;
            self.store()
                .set_field(
                    &ledger_ns,
                    &record.seq.to_string(),
                    &serde_json::to_vec(&record)?,
                )
                .await?;
            if flipped.is_none() {
                flipped = Some(record.handle.clone());
            }
        }

        match flipped {
            Some(handle) => {
                info!("user {} verified as @{} in group {}", user_id, handle, group);
                Ok(VerifyOutcome {
                    handle: Some(handle),
                    status: VerifyStatus::Verified,
                })
            }
            None => Ok(VerifyOutcome {
                handle: None,
                status: VerifyStatus::AlreadyVerified,
            }),
        }
    }

    /// First unverified record per user, in sequence order. Outside the
    /// verifying phase this returns the distinguished `NotVerifying` result,
    /// which callers must not confuse with an empty pending list.
    pub async fn list_unverified(
        &self,
        tenant: &TenantId,
        group: GroupId,
    ) -> Result<UnverifiedListing> {
        match self.get_phase(tenant, group).await {
            Some(Phase::Verifying) => {}
            _ => return Ok(UnverifiedListing::NotVerifying),
        }

        let mut seen: HashSet<UserId> = HashSet::new();
        let mut pending = Vec::new();
        for record in self.load_ledger(tenant, group).await? {
            if !record.verified && seen.insert(record.user_id) {
                pending.push(record);
            }
        }
        Ok(UnverifiedListing::Pending(pending))
    }
}
