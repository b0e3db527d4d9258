//! Session wiring: producers → bounded channel → correlator thread
//!
//! The channel transfers event ownership to a single correlator thread that
//! owns the reconstructor outright. Per-thread causal order is preserved
//! because the stream is consumed serially in arrival order, and the graph
//! needs no per-edge coordination beyond the aggregator's own bounded lock
//! scopes.
//!
//! ## Backpressure
//!
//! The channel is bounded. When the correlator cannot keep up, submission
//! drops the *newest* event (non-blocking `try_send`) and counts it: losing
//! a fresh event costs one call observation, losing the causal prefix would
//! corrupt stack reconstruction for everything after it.
//!
//! ## Shutdown
//!
//! Closing the channel (every sender dropped) makes the correlator drain
//! in-flight events, flush remaining open frames as unterminated, and exit.
//! The aggregator stays available for a final snapshot; partial calls are
//! counted, never guessed into edges.

use crate::correlate::{Reconstructor, ReconstructorConfig};
use crate::filter::FilterEngine;
use crate::graph::{Aggregator, GraphView};
use crate::ingest::TraceEvent;
use crate::stats::{SessionStats, StatsSnapshot};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info};
use std::sync::Arc;
use std::thread::JoinHandle;

/// How often the correlator wakes to run an eviction sweep while the
/// channel is quiet. Also bounds shutdown latency.
const SWEEP_TICK: std::time::Duration = std::time::Duration::from_millis(200);

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Bounded channel capacity between producers and the correlator.
    pub buffer_size: usize,
    pub reconstructor: ReconstructorConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { buffer_size: 65_536, reconstructor: ReconstructorConfig::default() }
    }
}

/// A running correlation session.
pub struct Session {
    tx: Option<Sender<TraceEvent>>,
    handle: Option<JoinHandle<()>>,
    aggregator: Arc<Aggregator>,
    filter: Arc<FilterEngine>,
    stats: Arc<SessionStats>,
}

impl Session {
    /// Spawn the correlator thread and return the running session.
    pub fn start(filter: FilterEngine, config: SessionConfig) -> Self {
        let filter = Arc::new(filter);
        let aggregator = Arc::new(Aggregator::new());
        let stats = Arc::new(SessionStats::default());

        let (tx, rx) = bounded(config.buffer_size);
        let reconstructor =
            Reconstructor::new(config.reconstructor, Arc::clone(&filter), Arc::clone(&stats));
        let handle = {
            let aggregator = Arc::clone(&aggregator);
            let stats = Arc::clone(&stats);
            std::thread::spawn(move || correlate_loop(&rx, reconstructor, &aggregator, &stats))
        };

        Self { tx: Some(tx), handle: Some(handle), aggregator, filter, stats }
    }

    /// Submit one event. Returns `false` when the event was dropped because
    /// the correlator is behind (counted as backpressure loss) or the
    /// session is already stopped.
    pub fn submit(&self, event: TraceEvent) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        SessionStats::bump(&self.stats.events_ingested);
        if tx.try_send(event).is_err() {
            SessionStats::bump(&self.stats.dropped_backpressure);
            return false;
        }
        true
    }

    /// Point-in-time view of the graph; safe to call while ingestion
    /// continues. Applies the policy's count bounds.
    pub fn snapshot(&self) -> GraphView {
        self.aggregator.snapshot(self.filter.count_bounds())
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Handle to the shared counters, for ingestors feeding this session.
    pub fn stats_handle(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }

    /// Stop ingestion: close the channel, drain in-flight events, flush
    /// eviction metrics. Idempotent; the session remains usable for final
    /// `snapshot()` / `stats()` calls.
    pub fn finish(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                debug!("correlator thread panicked during shutdown");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.finish();
    }
}

fn correlate_loop(
    rx: &Receiver<TraceEvent>,
    mut reconstructor: Reconstructor,
    aggregator: &Aggregator,
    stats: &SessionStats,
) {
    loop {
        match rx.recv_timeout(SWEEP_TICK) {
            Ok(event) => {
                aggregator.touch(event.timestamp);
                if let Some(edge) = reconstructor.observe(&event) {
                    aggregator.record(&edge);
                    SessionStats::bump(&stats.edges_recorded);
                }
                reconstructor.sweep();
            }
            Err(RecvTimeoutError::Timeout) => {
                reconstructor.sweep();
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    let dropped = reconstructor.drain_all();
    if dropped > 0 {
        info!("session drained with {dropped} unterminated calls");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityId, ThreadId, Timestamp};
    use crate::ingest::EventKind;

    fn event(kind: EventKind, function: &str, ts: u64) -> TraceEvent {
        TraceEvent {
            kind,
            thread_id: ThreadId(1),
            entity: EntityId::new("m", function),
            timestamp: Timestamp(ts),
            sequence: 0,
        }
    }

    #[test]
    fn test_session_correlates_and_snapshots() {
        let mut session = Session::start(FilterEngine::allow_all(), SessionConfig::default());
        assert!(session.submit(event(EventKind::Enter, "a", 0)));
        assert!(session.submit(event(EventKind::Exit, "a", 10)));
        session.finish();

        let view = session.snapshot();
        assert_eq!(view.nodes.len(), 1);
        assert_eq!(view.edges.len(), 1);
        assert_eq!(session.stats().edges_recorded, 1);
    }

    #[test]
    fn test_shutdown_drops_partial_calls() {
        let mut session = Session::start(FilterEngine::allow_all(), SessionConfig::default());
        session.submit(event(EventKind::Enter, "a", 0));
        session.submit(event(EventKind::Enter, "b", 1));
        session.finish();

        assert!(session.snapshot().edges.is_empty());
        assert_eq!(session.stats().unterminated_calls, 2);
    }

    #[test]
    fn test_submit_after_finish_reports_drop() {
        let mut session = Session::start(FilterEngine::allow_all(), SessionConfig::default());
        session.finish();
        assert!(!session.submit(event(EventKind::Enter, "a", 0)));
    }
}
