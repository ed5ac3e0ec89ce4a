use std::sync::Arc;

use tracing::warn;

use warden_types::{
    ChatId, MessageId, Offender, Result, TenantId, UserId, VerifyOutcome, VerifyStatus,
};

use crate::cleanup::CleanupLedger;
use crate::ports::EventSink;

/// Formats and sends moderation notices, tracking every emitted message in
/// the cleanup ledger so a later bulk cleanup can remove them.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn EventSink>,
    tracker: CleanupLedger,
}

fn mention(user_id: UserId, display_name: &str) -> String {
    format!("<a href=\"tg://user?id={user_id}\">{display_name}</a>")
}

impl Notifier {
    pub fn new(sink: Arc<dyn EventSink>, tracker: CleanupLedger) -> Self {
        Self { sink, tracker }
    }

    /// Announce a duplicate-handle alert naming every implicated submitter.
    pub async fn report_fraud(
        &self,
        tenant: &TenantId,
        chat_id: ChatId,
        handle: &str,
        offenders: &[Offender],
    ) -> Result<Option<MessageId>> {
        let tags = offenders
            .iter()
            .map(|o| mention(o.user_id, &o.display_name))
            .collect::<Vec<_>>()
            .join(", ");
        let text = format!(
            "⚠️ <b>Fraud Alert</b>\n\
             Multiple users are sharing the same account link: <code>@{handle}</code>\n\
             Suspicious users: {tags}"
        );
        self.deliver(tenant, chat_id, &text).await
    }

    /// Reply to a user's verification attempt.
    pub async fn report_verification(
        &self,
        tenant: &TenantId,
        chat_id: ChatId,
        user_id: UserId,
        display_name: &str,
        outcome: &VerifyOutcome,
    ) -> Result<Option<MessageId>> {
        let tag = mention(user_id, display_name);
        let text = match (outcome.status, &outcome.handle) {
            (VerifyStatus::Verified, Some(handle)) => {
                format!("{tag}'s account: @{handle}\nprofile: https://x.com/{handle}")
            }
            (VerifyStatus::Verified, None) => format!("{tag} verified."),
            (VerifyStatus::AlreadyVerified, _) => format!("⚠️ {tag} is already verified."),
            (VerifyStatus::NoMessages, _) => format!("⚠️ {tag} hasn't shared any links."),
        };
        self.deliver(tenant, chat_id, &text).await
    }

    /// Send through the sink and track the resulting message id. Delivery
    /// failures degrade to `None`; a failure to track the id surfaces, since
    /// losing track of an emitted message defeats the cleanup ledger.
    async fn deliver(
        &self,
        tenant: &TenantId,
        chat_id: ChatId,
        payload: &str,
    ) -> Result<Option<MessageId>> {
        match self.sink.send_event(chat_id, payload).await {
            Ok(message_id) => {
                self.tracker.track(tenant, chat_id, message_id).await?;
                Ok(Some(message_id))
            }
            Err(e) => {
                warn!("event delivery to chat {} failed: {}", chat_id, e);
                Ok(None)
            }
        }
    }
}
