//! Canonical-handle extraction and the duplicate-submission decision table.
//! Pure logic; the engine supplies the registry lookups around it.

use warden_types::{Offender, UserId};

/// External-account handles are 1..=15 word characters.
const MAX_HANDLE_LEN: usize = 15;

/// Extract the canonical handle from a submitted link.
///
/// Accepts `https://{host}/{handle}[/...]` for the configured hosts and
/// normalizes to lowercase. Deterministic: the same link text always yields
/// the same handle. Returns `None` for anything that is not an identity
/// link, which callers treat as "not a submission" rather than an error.
pub fn extract_handle(link: &str, hosts: &[String]) -> Option<String> {
    let rest = link.trim();
    let rest = rest
        .strip_prefix("https://")
        .or_else(|| rest.strip_prefix("http://"))?;
    let rest = rest.strip_prefix("www.").unwrap_or(rest);

    let (host, path) = rest.split_once('/')?;
    if !hosts.iter().any(|h| host.eq_ignore_ascii_case(h)) {
        return None;
    }

    let segment = path.split('/').next().unwrap_or("");
    let segment = segment
        .split(['?', '#'])
        .next()
        .unwrap_or("")
        .trim_start_matches('@');

    if segment.is_empty() || segment.len() > MAX_HANDLE_LEN {
        return None;
    }
    if !segment
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        return None;
    }

    Some(segment.to_ascii_lowercase())
}

/// Ruling for a handle that is already in the session's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResubmissionRuling {
    /// Same user posting their own handle again; allowed.
    Allowed,
    /// Same user, but the one-link-per-user policy is active.
    RejectedByPolicy,
    /// Different user claiming an already-claimed handle.
    Fraud,
}

/// Decision table for a previously seen handle, given everyone who has
/// submitted it so far. With no known prior submitters (a claim raced in
/// ahead of its ledger record) the ruling degrades to `Allowed`: a missing
/// offender list is no basis for a fraud alert.
pub fn resubmission_ruling(
    prior_submitters: &[Offender],
    user_id: UserId,
    one_link_per_user: bool,
) -> ResubmissionRuling {
    if prior_submitters.is_empty() {
        return ResubmissionRuling::Allowed;
    }
    if prior_submitters.iter().any(|o| o.user_id == user_id) {
        if one_link_per_user {
            ResubmissionRuling::RejectedByPolicy
        } else {
            ResubmissionRuling::Allowed
        }
    } else {
        ResubmissionRuling::Fraud
    }
}
