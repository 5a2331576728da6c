//! Fixed-window quota buckets
//!
//! Every incoming command passes an ordered pipeline of quota checks: a
//! per-command bucket first (only `help` carries one), then the shared
//! per-member bucket, then the shared global bucket. The first denial
//! wins and reports its remaining wait; buckets behind it are left
//! untouched for that attempt.

use crate::config::{
    GLOBAL_BUCKET_RATE, GLOBAL_BUCKET_WINDOW_SECS, HELP_BUCKET_RATE, HELP_BUCKET_WINDOW_SECS,
    MEMBER_BUCKET_RATE, MEMBER_BUCKET_WINDOW_SECS,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Scope of the key a quota bucket is tracked under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketKind {
    /// One bucket per (chat, user) pair
    Member,
    /// One bucket shared by everyone
    Global,
}

impl BucketKind {
    fn key_for(self, chat_id: i64, user_id: u64) -> BucketKey {
        match self {
            Self::Member => BucketKey::Member { chat_id, user_id },
            Self::Global => BucketKey::Global,
        }
    }
}

impl fmt::Display for BucketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member => f.write_str("member"),
            Self::Global => f.write_str("global"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BucketKey {
    Member { chat_id: i64, user_id: u64 },
    Global,
}

/// A quota denial: which scope said no and how long until it frees up
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("on cooldown ({scope}), try again in {:.2}s", .retry_after.as_secs_f64())]
pub struct QuotaExceeded {
    /// Remaining wait until the denying window frees up
    pub retry_after: Duration,
    /// Scope of the bucket that denied the attempt
    pub scope: BucketKind,
}

/// One fixed-window bucket: `rate` attempts per `per` seconds
///
/// The window starts at the first attempt after a refill and never
/// slides. A denied attempt refreshes the bucket's activity time but
/// leaves the window start untouched.
#[derive(Debug, Clone)]
pub struct Cooldown {
    rate: u32,
    per: f64,
    window: f64,
    tokens: u32,
    last: f64,
}

impl Cooldown {
    /// Creates a full bucket allowing `rate` attempts per `per` seconds
    #[must_use]
    pub fn new(rate: u32, per: f64) -> Self {
        Self {
            rate,
            per,
            window: 0.0,
            tokens: rate,
            last: 0.0,
        }
    }

    fn tokens_at(&self, now: f64) -> u32 {
        if now > self.window + self.per {
            self.rate
        } else {
            self.tokens
        }
    }

    /// Records one attempt at time `now` (seconds)
    ///
    /// Returns the remaining wait when the attempt exceeds the quota,
    /// `None` when it is allowed and a token was consumed.
    pub fn record(&mut self, now: f64) -> Option<f64> {
        self.last = now;

        self.tokens = self.tokens_at(now);
        if self.tokens == self.rate {
            self.window = now;
        }

        if self.tokens == 0 {
            return Some(self.per - (now - self.window));
        }

        self.tokens -= 1;
        None
    }
}

/// A lazily keyed family of [`Cooldown`] buckets sharing one rate
///
/// Buckets are created on first use and dropped again once they have
/// been idle for a full window, so the map only ever holds members seen
/// recently.
pub struct CooldownMapping {
    rate: u32,
    per: f64,
    kind: BucketKind,
    epoch: Instant,
    buckets: Mutex<HashMap<BucketKey, Cooldown>>,
}

impl CooldownMapping {
    /// Creates a mapping allowing `rate` attempts per `per_secs` window
    #[must_use]
    pub fn new(rate: u32, per_secs: f64, kind: BucketKind) -> Self {
        Self {
            rate,
            per: per_secs,
            kind,
            epoch: Instant::now(),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Scope this mapping keys its buckets by
    #[must_use]
    pub fn kind(&self) -> BucketKind {
        self.kind
    }

    /// Records one attempt for `(chat_id, user_id)` against its bucket
    ///
    /// Returns the remaining wait when the attempt exceeds the quota.
    /// The attempt is recorded either way.
    pub fn record(&self, chat_id: i64, user_id: u64) -> Option<Duration> {
        let now = self.epoch.elapsed().as_secs_f64();
        self.record_at(chat_id, user_id, now)
    }

    fn record_at(&self, chat_id: i64, user_id: u64, now: f64) -> Option<Duration> {
        let mut buckets = self.lock_buckets();

        // Drop buckets idle for a full window before touching this one
        buckets.retain(|_, bucket| now <= bucket.last + bucket.per);

        let bucket = buckets
            .entry(self.kind.key_for(chat_id, user_id))
            .or_insert_with(|| Cooldown::new(self.rate, self.per));

        bucket.record(now).map(Duration::from_secs_f64)
    }

    /// Number of buckets currently tracked
    ///
    /// Useful for monitoring and health checks.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.lock_buckets().len()
    }

    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<BucketKey, Cooldown>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The ordered quota pipeline every command runs through
pub struct RateLimiter {
    command_buckets: Vec<(&'static str, CooldownMapping)>,
    shared: Vec<CooldownMapping>,
}

impl RateLimiter {
    /// Creates a limiter from explicit bucket mappings
    ///
    /// `command_buckets` are consulted first and only for the command
    /// they are named after; `shared` mappings gate every command, in
    /// order.
    #[must_use]
    pub fn new(
        command_buckets: Vec<(&'static str, CooldownMapping)>,
        shared: Vec<CooldownMapping>,
    ) -> Self {
        Self {
            command_buckets,
            shared,
        }
    }

    /// Creates the production pipeline: help 1 per 10s per member, then
    /// 5 image queries per 10s per member, then 500 per hour globally
    #[must_use]
    pub fn with_default_buckets() -> Self {
        Self::new(
            vec![(
                "help",
                CooldownMapping::new(HELP_BUCKET_RATE, HELP_BUCKET_WINDOW_SECS, BucketKind::Member),
            )],
            vec![
                CooldownMapping::new(
                    MEMBER_BUCKET_RATE,
                    MEMBER_BUCKET_WINDOW_SECS,
                    BucketKind::Member,
                ),
                CooldownMapping::new(
                    GLOBAL_BUCKET_RATE,
                    GLOBAL_BUCKET_WINDOW_SECS,
                    BucketKind::Global,
                ),
            ],
        )
    }

    /// Runs the quota pipeline for one attempt at `command`
    ///
    /// Every mapping that gets consulted records the attempt, allowed or
    /// not; mappings behind the first denial are not consulted.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaExceeded`] from the first denying bucket.
    pub fn check(&self, command: &str, chat_id: i64, user_id: u64) -> Result<(), QuotaExceeded> {
        let per_command = self
            .command_buckets
            .iter()
            .filter(|(name, _)| *name == command)
            .map(|(_, mapping)| mapping);

        for mapping in per_command.chain(&self.shared) {
            if let Some(retry_after) = mapping.record(chat_id, user_id) {
                let denial = QuotaExceeded {
                    retry_after,
                    scope: mapping.kind(),
                };
                debug!("Throttled /{command} for user {user_id}: {denial}");
                return Err(denial);
            }
        }

        Ok(())
    }
}
