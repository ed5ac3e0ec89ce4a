use std::time::Duration;

/// Tunables for the moderation core.
///
/// Defaults suit a multi-tenant deployment behind short-lived webhook
/// handlers; everything can be overridden from the environment.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Shared store URL (`redis://...`). `None` selects the process-local
    /// store, which only makes sense for tests and single-worker setups.
    pub store_url: Option<String>,
    /// Per-call store timeout. On expiry, reads degrade to a miss and
    /// writes surface as `StoreUnavailable`.
    pub store_timeout: Duration,
    /// How long a phase lookup may be served from cache. Kept short: a
    /// stale phase delays cross-worker visibility of a transition.
    pub phase_cache_ttl: Duration,
    /// How long a fetched admin list stays authoritative.
    pub admin_cache_ttl: Duration,
    /// Revalidation bound of the in-process cache tier.
    pub local_cache_ttl: Duration,
    /// Whole-session TTL in the store; sessions live hours, not days.
    pub session_ttl: Duration,
    /// Expiry of tracked bot messages never consumed by a cleanup.
    pub tracked_message_ttl: Duration,
    /// Progress callback interval for bulk cleanup, in deletions.
    pub progress_every: usize,
    /// When set, a user resubmitting a handle they already posted is
    /// rejected instead of accepted.
    pub one_link_per_user: bool,
    /// Hosts whose links count as identity submissions.
    pub link_hosts: Vec<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            store_timeout: Duration::from_secs(3),
            phase_cache_ttl: Duration::from_secs(5),
            admin_cache_ttl: Duration::from_secs(600),
            local_cache_ttl: Duration::from_secs(300),
            session_ttl: Duration::from_secs(12 * 3600),
            tracked_message_ttl: Duration::from_secs(48 * 3600),
            progress_every: 10,
            one_link_per_user: false,
            link_hosts: vec!["x.com".to_string(), "twitter.com".to_string()],
        }
    }
}

impl CoreConfig {
    /// Build a config from `WARDEN_*` environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let secs = |name: &str, fallback: Duration| -> Duration {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        Self {
            store_url: std::env::var("WARDEN_STORE_URL").ok().filter(|v| !v.is_empty()),
            store_timeout: secs("WARDEN_STORE_TIMEOUT_SECS", defaults.store_timeout),
            phase_cache_ttl: secs("WARDEN_PHASE_CACHE_TTL_SECS", defaults.phase_cache_ttl),
            admin_cache_ttl: secs("WARDEN_ADMIN_CACHE_TTL_SECS", defaults.admin_cache_ttl),
            local_cache_ttl: defaults.local_cache_ttl,
            session_ttl: std::env::var("WARDEN_SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(|h| Duration::from_secs(h * 3600))
                .unwrap_or(defaults.session_ttl),
            tracked_message_ttl: std::env::var("WARDEN_TRACKED_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(|h| Duration::from_secs(h * 3600))
                .unwrap_or(defaults.tracked_message_ttl),
            progress_every: defaults.progress_every,
            one_link_per_user: std::env::var("WARDEN_ONE_LINK_PER_USER")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.one_link_per_user),
            link_hosts: std::env::var("WARDEN_LINK_HOSTS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(|h| h.trim().to_string())
                        .filter(|h| !h.is_empty())
                        .collect()
                })
                .filter(|hosts: &Vec<String>| !hosts.is_empty())
                .unwrap_or(defaults.link_hosts),
        }
    }
}
