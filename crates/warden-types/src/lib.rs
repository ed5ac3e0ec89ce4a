pub mod error;
pub mod session;

pub use error::{EngineError, Result};
pub use session::{
    ArchivedSession, ChatId, GroupId, IgnoreReason, IngestOutcome, MessageId, MessageRecord,
    MultiLinkUser, Offender, Phase, StartOutcome, TenantId, UnverifiedListing, UserId,
    VerifyOutcome, VerifyStatus,
};
