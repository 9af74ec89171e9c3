//! Report cache
//!
//! Completed reports keyed by `(diagram_id, phase_set)` and by analysis id.
//! Entries expire after the TTL; expiry is checked lazily on read and
//! swept by [`ReportCache::purge_expired`].

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::types::{AnalysisReport, PhaseSet};

/// Time source for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self
            .offset
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self
            .offset
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.origin + offset
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    diagram_id: String,
    phase_set: String,
}

impl CacheKey {
    fn new(diagram_id: &str, phases: &PhaseSet) -> Self {
        Self {
            diagram_id: diagram_id.to_string(),
            phase_set: phases.key(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    report: Arc<AnalysisReport>,
    stored_at: Instant,
}

pub struct ReportCache {
    by_key: DashMap<CacheKey, CacheEntry>,
    by_analysis_id: DashMap<String, CacheEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ReportCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            by_key: DashMap::new(),
            by_analysis_id: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live report for a diagram and phase set.
    pub fn get(&self, diagram_id: &str, phases: &PhaseSet) -> Option<Arc<AnalysisReport>> {
        let key = CacheKey::new(diagram_id, phases);
        let now = self.clock.now();

        let hit = self.by_key.get(&key).map(|entry| {
            (!self.is_expired(&entry, now)).then(|| Arc::clone(&entry.report))
        })?;

        if hit.is_none() {
            self.by_key.remove_if(&key, |_, entry| self.is_expired(entry, now));
            debug!(diagram_id, "Cached report expired");
        }
        hit
    }

    /// Live report for an analysis id.
    pub fn get_by_analysis_id(&self, analysis_id: &str) -> Option<Arc<AnalysisReport>> {
        let now = self.clock.now();

        let hit = self.by_analysis_id.get(analysis_id).map(|entry| {
            (!self.is_expired(&entry, now)).then(|| Arc::clone(&entry.report))
        })?;

        if hit.is_none() {
            self.by_analysis_id
                .remove_if(analysis_id, |_, entry| self.is_expired(entry, now));
        }
        hit
    }

    /// Store a report. A newer report for the same diagram and phase set
    /// replaces the older one; the older analysis id keeps resolving.
    pub fn insert(&self, report: Arc<AnalysisReport>) {
        let entry = CacheEntry {
            report: Arc::clone(&report),
            stored_at: self.clock.now(),
        };
        self.by_key.insert(
            CacheKey::new(&report.diagram_id, &report.phase_set),
            entry.clone(),
        );
        self.by_analysis_id
            .insert(report.analysis_id.clone(), entry);
    }

    /// Drop every expired entry, returning how many reports were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.by_analysis_id.len();
        self.by_key.retain(|_, entry| !self.is_expired(entry, now));
        self.by_analysis_id
            .retain(|_, entry| !self.is_expired(entry, now));
        let purged = before.saturating_sub(self.by_analysis_id.len());
        if purged > 0 {
            debug!(purged, "Purged expired reports");
        }
        purged
    }

    pub fn clear(&self) {
        self.by_key.clear();
        self.by_analysis_id.clear();
    }

    /// Reports currently reachable by diagram and phase set
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) >= self.ttl
    }
}
