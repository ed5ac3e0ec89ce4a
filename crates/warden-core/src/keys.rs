//! Store key layout. Every namespace is scoped by tenant so workers serving
//! different bot instances never collide.

use warden_types::{ChatId, GroupId, TenantId, UserId};

pub(crate) fn session_key(tenant: &TenantId, group: GroupId) -> String {
    format!("sess:{tenant}:{group}")
}

pub(crate) fn ledger_key(tenant: &TenantId, group: GroupId) -> String {
    format!("ledger:{tenant}:{group}")
}

pub(crate) fn handles_key(tenant: &TenantId, group: GroupId) -> String {
    format!("handles:{tenant}:{group}")
}

pub(crate) fn user_index_key(tenant: &TenantId, group: GroupId, user_id: UserId) -> String {
    format!("uidx:{tenant}:{group}:{user_id}")
}

pub(crate) fn sr_key(tenant: &TenantId, group: GroupId) -> String {
    format!("sr:{tenant}:{group}")
}

pub(crate) fn tracked_key(tenant: &TenantId, chat_id: ChatId) -> String {
    format!("tracked:{tenant}:{chat_id}")
}

pub(crate) fn cache_key(tenant: &TenantId, kind: &str) -> String {
    format!("cache:{tenant}:{kind}")
}
