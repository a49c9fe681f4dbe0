//! Access token cache
//!
//! Tokens are keyed by app key and expire on the cache's own schedule, which
//! is deliberately shorter than the platform's 7200s token lifetime. The
//! declared `expires_in` of a token plays no part in eviction.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default time-to-live of a cached token (platform tokens live 7200s)
pub const DEFAULT_TTL: Duration = Duration::from_secs(7000);

/// Default interval between sweeps of expired entries
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(7200);

/// Expiry used when `now + ttl` does not fit in an `Instant` (about 30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Concurrent access token cache shared by every client of the process
#[derive(Debug)]
pub struct TokenCache {
    entries: DashMap<String, CachedToken>,
    ttl: Duration,
    cleanup_interval: Duration,
    last_sweep: Mutex<Instant>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::with_policy(DEFAULT_TTL, DEFAULT_CLEANUP_INTERVAL)
    }

    /// Create a cache with a custom TTL and cleanup interval
    pub fn with_policy(ttl: Duration, cleanup_interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            cleanup_interval,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a valid token for `key`
    ///
    /// `None` means there is no usable entry: never cached, expired, or empty.
    pub fn get(&self, key: &str) -> Option<String> {
        self.sweep_if_due();

        if let Some(entry) = self.entries.get(key)
            && entry.is_valid()
            && !entry.token.is_empty()
        {
            return Some(entry.token.clone());
        }

        // Only drop the entry if it is still stale; a concurrent put may have
        // replaced it in the meantime.
        if self
            .entries
            .remove_if(key, |_, entry| !entry.is_valid())
            .is_some()
        {
            debug!("Evicted expired access token for {}", key);
        }
        None
    }

    /// Insert or replace the token for `key`
    pub fn put(&self, key: &str, token: impl Into<String>) {
        self.sweep_if_due();

        let now = Instant::now();
        let expires_at = now
            .checked_add(self.ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        self.entries.insert(
            key.to_string(),
            CachedToken {
                token: token.into(),
                expires_at,
            },
        );
    }

    /// Number of entries currently held, including ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry once the cleanup interval has elapsed
    fn sweep_if_due(&self) {
        let now = Instant::now();
        {
            let mut last = self.last_sweep.lock();
            if now.duration_since(*last) < self.cleanup_interval {
                return;
            }
            *last = now;
        }

        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let swept = before.saturating_sub(self.entries.len());
        if swept > 0 {
            debug!("Swept {} expired access token(s)", swept);
        }
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}
