use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use crate::model::RawResult;

/// Why a collection cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// Every tracked job reached the target depth.
    ByDepth,
    /// Nothing arrived within the inactivity window.
    ByTimeout,
}

/// Per-cycle completion detection: counts, for every job id seen, how many
/// deliveries have mentioned it, and tracks the inactivity deadline.
///
/// Owned by exactly one collection cycle; a new tracker is built for every
/// session so state can never leak across cycles.
#[derive(Debug)]
pub struct DepthTracker {
    target_depth: u32,
    inactivity_window: Duration,
    last_activity: Instant,
    jobs: BTreeMap<i64, u32>,
}

impl DepthTracker {
    pub fn new(target_depth: u32, inactivity_window: Duration) -> Self {
        Self {
            target_depth,
            inactivity_window,
            last_activity: Instant::now(),
            jobs: BTreeMap::new(),
        }
    }

    /// Count one processed delivery: +1 for every distinct job id present,
    /// however many records the batch carries for it, and reset the
    /// inactivity clock.
    pub fn observe_batch(&mut self, batch: &[RawResult]) {
        let distinct: BTreeSet<i64> = batch.iter().map(|r| r.job_id).collect();
        for job_id in distinct {
            *self.jobs.entry(job_id).or_insert(0) += 1;
        }
        self.last_activity = Instant::now();
    }

    /// True once at least one job is tracked and every tracked job has
    /// reached the target depth.
    pub fn complete_by_depth(&self) -> bool {
        !self.jobs.is_empty() && self.jobs.values().all(|d| *d >= self.target_depth)
    }

    /// Time left until the inactivity deadline; bounds the next receive.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.inactivity_window
            .saturating_sub(now.duration_since(self.last_activity))
    }

    pub fn timed_out(&self, now: Instant) -> bool {
        now.duration_since(self.last_activity) >= self.inactivity_window
    }

    pub fn jobs(&self) -> &BTreeMap<i64, u32> {
        &self.jobs
    }

    pub fn into_jobs(self) -> BTreeMap<i64, u32> {
        self.jobs
    }
}
