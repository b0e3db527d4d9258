//! Diagnostic counters for the ingestion/correlation pipeline
//!
//! Every anomaly the pipeline recovers from locally is folded into one of
//! these counters instead of propagating a failure that would stop the
//! stream. The counters are shared across the ingestor, the correlator
//! thread and the caller, so they use atomics; reads take a [`StatsSnapshot`]
//! for consistent reporting.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared pipeline counters.
///
/// All increments use relaxed ordering: the counters are diagnostics, not
/// synchronization points.
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Records accepted by the ingestor and handed to the channel.
    pub events_ingested: AtomicU64,
    /// Records rejected at decode/validation time.
    pub malformed_records: AtomicU64,
    /// Records carrying a sequence number that regressed for their thread.
    pub out_of_order: AtomicU64,
    /// Events dropped because the channel to the correlator was full.
    pub dropped_backpressure: AtomicU64,
    /// Completed calls recorded into the graph.
    pub edges_recorded: AtomicU64,
    /// Frames discarded above a recovered mismatched exit.
    pub orphaned_frames: AtomicU64,
    /// Exits that matched no open frame anywhere on their thread's stack.
    pub unattributable_exits: AtomicU64,
    /// Frames force-popped by idle eviction or shutdown drain.
    pub unterminated_calls: AtomicU64,
    /// Enters refused because a thread's stack hit the depth cap.
    pub overflow_drops: AtomicU64,
    /// Enters pushed as suppressed markers by filter policy.
    pub suppressed_calls: AtomicU64,
}

impl SessionStats {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Consistent point-in-time copy for reporting.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_ingested: self.events_ingested.load(Ordering::Relaxed),
            malformed_records: self.malformed_records.load(Ordering::Relaxed),
            out_of_order: self.out_of_order.load(Ordering::Relaxed),
            dropped_backpressure: self.dropped_backpressure.load(Ordering::Relaxed),
            edges_recorded: self.edges_recorded.load(Ordering::Relaxed),
            orphaned_frames: self.orphaned_frames.load(Ordering::Relaxed),
            unattributable_exits: self.unattributable_exits.load(Ordering::Relaxed),
            unterminated_calls: self.unterminated_calls.load(Ordering::Relaxed),
            overflow_drops: self.overflow_drops.load(Ordering::Relaxed),
            suppressed_calls: self.suppressed_calls.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`SessionStats`] taken at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub events_ingested: u64,
    pub malformed_records: u64,
    pub out_of_order: u64,
    pub dropped_backpressure: u64,
    pub edges_recorded: u64,
    pub orphaned_frames: u64,
    pub unattributable_exits: u64,
    pub unterminated_calls: u64,
    pub overflow_drops: u64,
    pub suppressed_calls: u64,
}

impl StatsSnapshot {
    /// True when every recovery counter is zero.
    pub fn is_clean(&self) -> bool {
        self.malformed_records == 0
            && self.out_of_order == 0
            && self.dropped_backpressure == 0
            && self.orphaned_frames == 0
            && self.unattributable_exits == 0
            && self.unterminated_calls == 0
            && self.overflow_drops == 0
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ingested={} edges={} malformed={} out_of_order={} dropped={} \
             orphaned={} unattributable={} unterminated={} overflow={} suppressed={}",
            self.events_ingested,
            self.edges_recorded,
            self.malformed_records,
            self.out_of_order,
            self.dropped_backpressure,
            self.orphaned_frames,
            self.unattributable_exits,
            self.unterminated_calls,
            self.overflow_drops,
            self.suppressed_calls,
        )
    }
}
