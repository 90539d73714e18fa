//! # Fixed-Window Limiter
//!
//! Counts invocations per `(identity, field path)` pair inside fixed windows.
//! Fixed windows keep one timestamp and one counter per key; the price is
//! that a caller can land up to `2 × max_count` calls across a window edge.
//!
//! ## Concurrency
//!
//! The table is a sharded [`DashMap`]. A check takes the key's entry guard,
//! which write-locks its shard, performs the whole read-modify-write, and
//! releases it before returning. Concurrent checks on one key therefore see
//! a linearizable sequence of increments; checks on different keys only
//! contend when they hash to the same shard. No guard is ever held across an
//! `.await`.
//!
//! ## Growth
//!
//! Entries are created lazily and removed by [`WindowLimiter::sweep`] once
//! their window has been over for `idle_windows × window`, either by the
//! periodic sweeper or, at most once per `overflow_sweep_interval`, when a
//! new key lands in a table already at `max_entries`. `max_entries` is not a
//! hard cap: while every entry is live the table keeps growing until the
//! next sweep can evict something.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

/// Key of one counter: who is calling, and which field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimitKey {
    identity: String,
    field_path: String,
}

impl LimitKey {
    pub fn new(identity: impl Into<String>, field_path: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            field_path: field_path.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn field_path(&self) -> &str {
        &self.field_path
    }
}

/// Result of [`WindowLimiter::check_and_consume`]. A plain decision, not an
/// error; the rule engine turns `Denied` into a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDecision {
    Allowed,
    Denied,
}

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    window_start: Instant,
    window: Duration,
    count: u32,
}

impl WindowCounter {
    /// True once the window has been over for `idle_windows` more windows.
    fn is_idle(&self, now: Instant, idle_windows: u32) -> bool {
        let horizon = self.window.saturating_mul(idle_windows.saturating_add(1));
        now.saturating_duration_since(self.window_start) >= horizon
    }
}

/// Eviction settings for the counter table.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Windows an entry may stay expired before a sweep removes it.
    pub idle_windows: u32,
    /// Table size that triggers a sweep on insert.
    pub max_entries: usize,
    /// Minimum gap between two sweeps triggered by `max_entries`.
    pub overflow_sweep_interval: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            idle_windows: 2,
            max_entries: 100_000,
            overflow_sweep_interval: Duration::from_secs(1),
        }
    }
}

/// Shared, cloneable fixed-window limiter. Clones share one table.
#[derive(Debug, Clone)]
pub struct WindowLimiter {
    config: LimiterConfig,
    entries: Arc<DashMap<LimitKey, WindowCounter>>,
    last_overflow_sweep: Arc<Mutex<Option<Instant>>>,
}

impl WindowLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(DashMap::new()),
            last_overflow_sweep: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Count one invocation for `key` and decide whether it fits the budget.
    pub fn check_and_consume(
        &self,
        key: &LimitKey,
        window: Duration,
        max_count: u32,
    ) -> LimitDecision {
        self.check_and_consume_at(key, window, max_count, Instant::now())
    }

    /// [`check_and_consume`](Self::check_and_consume) with an explicit clock.
    pub fn check_and_consume_at(
        &self,
        key: &LimitKey,
        window: Duration,
        max_count: u32,
        now: Instant,
    ) -> LimitDecision {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let counter = occupied.get_mut();
                counter.window = window;
                if now.saturating_duration_since(counter.window_start) >= window {
                    counter.window_start = now;
                    counter.count = 1;
                } else {
                    // Over-budget calls still count: a denied caller stays
                    // denied until the window rolls over.
                    counter.count = counter.count.saturating_add(1);
                }
                return decide(counter.count, max_count);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(WindowCounter {
                    window_start: now,
                    window,
                    count: 1,
                });
            }
        }

        // The entry guard is released here; len() and retain() lock shards.
        if self.entries.len() > self.config.max_entries && self.claim_overflow_sweep(now) {
            let evicted = self.sweep_at(now);
            tracing::warn!(
                evicted,
                remaining = self.entries.len(),
                max_entries = self.config.max_entries,
                "rate limit table over capacity, swept idle entries"
            );
        }

        decide(1, max_count)
    }

    /// True if this caller should run the over-capacity sweep. Losers of a
    /// concurrent claim skip it.
    fn claim_overflow_sweep(&self, now: Instant) -> bool {
        let Some(mut last) = self.last_overflow_sweep.try_lock() else {
            return false;
        };
        let due = match *last {
            Some(at) => now.saturating_duration_since(at) >= self.config.overflow_sweep_interval,
            None => true,
        };
        if due {
            *last = Some(now);
        }
        due
    }

    /// Current count for `key` in its live window, if an entry exists.
    pub fn count(&self, key: &LimitKey) -> Option<u32> {
        self.entries.get(key).map(|counter| counter.count)
    }

    /// Remove entries idle for longer than the configured horizon.
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// [`sweep`](Self::sweep) with an explicit clock.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let idle_windows = self.config.idle_windows;
        let mut evicted = 0usize;
        self.entries.retain(|_, counter| {
            if counter.is_idle(now, idle_windows) {
                evicted += 1;
                false
            } else {
                true
            }
        });
        evicted
    }

    /// Run [`sweep`](Self::sweep) every `every` on the current tokio runtime.
    pub fn spawn_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = limiter.sweep();
                if evicted > 0 {
                    tracing::debug!(
                        evicted,
                        remaining = limiter.len(),
                        "swept idle rate limit entries"
                    );
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for WindowLimiter {
    fn default() -> Self {
        Self::new(LimiterConfig::default())
    }
}

fn decide(count: u32, max_count: u32) -> LimitDecision {
    if count <= max_count {
        LimitDecision::Allowed
    } else {
        LimitDecision::Denied
    }
}
