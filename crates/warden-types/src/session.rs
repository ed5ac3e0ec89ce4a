/// Model types shared across the workspace.
/// Chat-platform ids (users, chats, messages) are plain i64s as delivered by
/// the webhook layer; tenants are an opaque string id.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = i64;
pub type ChatId = i64;
pub type GroupId = i64;
pub type MessageId = i64;

/// One independently configured bot instance sharing this core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Position of a session in its lifecycle.
/// Advances monotonically collecting -> verifying -> closed; `closed` is
/// terminal for a session instance, a later start creates a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Collecting,
    Verifying,
    Closed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Collecting => "collecting",
            Phase::Verifying => "verifying",
            Phase::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "collecting" => Some(Phase::Collecting),
            "verifying" => Some(Phase::Verifying),
            "closed" => Some(Phase::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submitted link in a session's ledger.
///
/// Immutable once written except for the `verified` flag, which flips
/// false -> true at most once. Sequence numbers are contiguous and unique
/// within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub seq: u64,
    pub user_id: UserId,
    pub display_name: String,
    pub link: String,
    /// Canonical external-account handle extracted from the link.
    pub handle: String,
    pub verified: bool,
    /// Set when the handle was already claimed by a different user; the
    /// record is kept for audit but never counts toward verified totals.
    pub fraud: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Full ledger of a finished session, handed to the archive collaborator
/// before hot state is cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedSession {
    pub tenant: TenantId,
    pub group_id: GroupId,
    pub session_uid: Uuid,
    pub started_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub records: Vec<MessageRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A session already exists for this group; starting again is a no-op.
    AlreadyStarted,
}

/// A user implicated in a duplicate-handle submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offender {
    pub user_id: UserId,
    pub display_name: String,
}

/// Result of ingesting one submitted link.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Accepted(MessageRecord),
    /// Same user resubmitted a handle while the one-link-per-user policy is
    /// active; nothing was stored.
    DuplicateSubmission { handle: String },
    /// The handle was already claimed by a different user. The record is
    /// stored with its fraud marker; `offenders` names every submitter.
    FraudAlert {
        handle: String,
        offenders: Vec<Offender>,
        record: MessageRecord,
    },
    /// Silently skipped; stray messages outside a collecting session are
    /// not processed.
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NoSession,
    SessionClosed,
    NotCollecting,
    NotALink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifyStatus {
    Verified,
    AlreadyVerified,
    NoMessages,
}

/// Result of marking a user verified. `handle` is the representative handle
/// of the first record flipped by this call, `None` when nothing flipped.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub handle: Option<String>,
    pub status: VerifyStatus,
}

/// Result of listing unverified submitters.
/// `NotVerifying` is a distinct outcome, never to be conflated with an empty
/// pending list.
#[derive(Debug, Clone, PartialEq)]
pub enum UnverifiedListing {
    NotVerifying,
    /// First unverified record per user, in sequence order.
    Pending(Vec<MessageRecord>),
}

/// A user who submitted more than one link in the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiLinkUser {
    pub user_id: UserId,
    pub display_name: String,
    pub links: Vec<String>,
}
