//! # Admission Counters
//!
//! In-process atomic counters for gate outcomes, in the same shape as the
//! API's request metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::DenialKind;

/// Shared gate counters. Clones share the same atomics.
#[derive(Debug, Clone, Default)]
pub struct AdmissionMetrics {
    admitted: Arc<AtomicU64>,
    unguarded: Arc<AtomicU64>,
    rate_limited: Arc<AtomicU64>,
    forbidden: Arc<AtomicU64>,
}

/// Point-in-time copy of [`AdmissionMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdmissionSnapshot {
    pub admitted: u64,
    pub unguarded: u64,
    pub rate_limited: u64,
    pub forbidden: u64,
}

impl AdmissionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unguarded(&self) {
        self.unguarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_denied(&self, kind: DenialKind) {
        let counter = match kind {
            DenialKind::RateLimitExceeded => &self.rate_limited,
            DenialKind::Unauthorized => &self.forbidden,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AdmissionSnapshot {
        AdmissionSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            unguarded: self.unguarded.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            forbidden: self.forbidden.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denials_split_by_kind() {
        let metrics = AdmissionMetrics::new();
        metrics.record_admitted();
        metrics.record_unguarded();
        metrics.record_denied(DenialKind::RateLimitExceeded);
        metrics.record_denied(DenialKind::Unauthorized);
        metrics.record_denied(DenialKind::Unauthorized);

        let clone = metrics.clone();
        assert_eq!(
            clone.snapshot(),
            AdmissionSnapshot {
                admitted: 1,
                unguarded: 1,
                rate_limited: 1,
                forbidden: 2,
            }
        );
    }
}
