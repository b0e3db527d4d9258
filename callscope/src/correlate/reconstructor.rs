//! Stack reconstruction: flat event streams → completed call observations
//!
//! One [`Reconstructor`] consumes the whole (multi-thread) event stream in
//! arrival order, maintaining one stack per thread. Only total order within
//! a thread matters: each thread's stack is mutated exclusively by events
//! carrying that `thread_id`, and cross-thread calls are never correlated.
//!
//! ## Recovery
//!
//! Probe streams are lossy. An Exit whose entity does not match the top of
//! its thread's stack triggers the recovery heuristic: scan downward for a
//! matching open frame, discard everything above it as orphaned (counted,
//! no edges), and close the match. An Exit matching nothing is discarded as
//! unattributable, leaving the stack untouched. Threads that go quiet are
//! drained by idle eviction so a dead process cannot leak open frames.

use crate::domain::{Duration, EntityId, ThreadId, Timestamp};
use crate::filter::FilterEngine;
use crate::ingest::{EventKind, TraceEvent};
use crate::stats::SessionStats;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

use super::stack::{CallFrame, ThreadStack};

/// Which open frame an exit closes when several carry the same entity
/// (direct recursion observed through a lossy stream).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Closest to the top of the stack. Default: with missing-exit loss,
    /// the innermost open call is the one most likely to be returning.
    #[default]
    Innermost,
    /// Closest to the root.
    Outermost,
}

/// Reconstruction tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct ReconstructorConfig {
    /// Threads with no activity for longer than this (event time) have
    /// their stacks drained as unterminated.
    pub idle_timeout: Duration,
    /// Hard per-thread depth cap; Enters beyond it are refused and counted.
    pub max_stack_depth: usize,
    pub match_strategy: MatchStrategy,
}

impl Default for ReconstructorConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_millis(30_000),
            max_stack_depth: 512,
            match_strategy: MatchStrategy::default(),
        }
    }
}

/// One completed call, attributed to its caller. Ephemeral: consumed by the
/// aggregator immediately after emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEdge {
    /// Enclosing entity, or `None` for a depth-0 (root) call.
    pub caller: Option<EntityId>,
    pub callee: EntityId,
    pub enter_time: Timestamp,
    pub duration: Duration,
    /// Depth of the completed frame (0 = root).
    pub depth: usize,
}

/// The stack reconstructor state machine.
pub struct Reconstructor {
    config: ReconstructorConfig,
    filter: Arc<FilterEngine>,
    stats: Arc<SessionStats>,
    stacks: HashMap<ThreadId, ThreadStack>,
    /// Newest timestamp seen anywhere in the stream; the clock idle
    /// eviction is measured against.
    watermark: Timestamp,
}

impl Reconstructor {
    pub fn new(
        config: ReconstructorConfig,
        filter: Arc<FilterEngine>,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self { config, filter, stats, stacks: HashMap::new(), watermark: Timestamp::default() }
    }

    pub fn watermark(&self) -> Timestamp {
        self.watermark
    }

    /// Open frames across all threads (diagnostics).
    pub fn open_frames(&self) -> usize {
        self.stacks.values().map(ThreadStack::depth).sum()
    }

    /// Consume one event; a completed call yields its edge.
    pub fn observe(&mut self, event: &TraceEvent) -> Option<CallEdge> {
        self.watermark = self.watermark.max(event.timestamp);
        match event.kind {
            EventKind::Enter => {
                self.on_enter(event);
                None
            }
            EventKind::Exit => self.on_exit(event),
        }
    }

    fn on_enter(&mut self, event: &TraceEvent) {
        let stack = self
            .stacks
            .entry(event.thread_id)
            .or_insert_with(|| ThreadStack::new(event.timestamp));
        stack.touch(event.timestamp);

        if stack.depth() >= self.config.max_stack_depth {
            SessionStats::bump(&self.stats.overflow_drops);
            debug!("{}: depth cap {} hit, refusing enter", event.thread_id, stack.depth());
            return;
        }

        let depth = stack.depth();
        let allowed = self.filter.allowed(&event.entity, depth);
        if !allowed {
            SessionStats::bump(&self.stats.suppressed_calls);
        }
        stack.push(CallFrame {
            entity: event.entity.clone(),
            enter_time: event.timestamp,
            depth,
            suppressed: !allowed,
        });
    }

    fn on_exit(&mut self, event: &TraceEvent) -> Option<CallEdge> {
        let Some(stack) = self.stacks.get_mut(&event.thread_id) else {
            SessionStats::bump(&self.stats.unattributable_exits);
            return None;
        };
        stack.touch(event.timestamp);

        let matched = match stack.top() {
            Some(top) if top.entity == event.entity => stack.depth() - 1,
            _ => {
                // Out-of-order or missing Enter: recovery heuristic.
                let Some(index) = stack.find_match(&event.entity, self.config.match_strategy)
                else {
                    SessionStats::bump(&self.stats.unattributable_exits);
                    return None;
                };
                let orphaned = stack.depth() - index - 1;
                for _ in 0..orphaned {
                    stack.pop();
                }
                SessionStats::add(&self.stats.orphaned_frames, orphaned as u64);
                debug!("{}: discarded {orphaned} orphaned frames", event.thread_id);
                index
            }
        };

        let caller = stack.caller_beneath(matched).cloned();
        let frame = stack.pop()?;
        if frame.suppressed {
            return None;
        }
        Some(CallEdge {
            caller,
            callee: frame.entity,
            enter_time: frame.enter_time,
            duration: event.timestamp.since(frame.enter_time),
            depth: frame.depth,
        })
    }

    /// Drain stacks of threads idle past the configured timeout, measured
    /// against the stream watermark. Each drained frame counts as an
    /// unterminated call; no edges are emitted.
    pub fn sweep(&mut self) -> u64 {
        let now = self.watermark;
        let timeout = self.config.idle_timeout;
        let idle: Vec<ThreadId> = self
            .stacks
            .iter()
            .filter(|(_, stack)| now.since(stack.last_activity()) > timeout)
            .map(|(id, _)| *id)
            .collect();

        let mut evicted = 0u64;
        for thread_id in idle {
            if let Some(mut stack) = self.stacks.remove(&thread_id) {
                let frames = stack.drain();
                if !frames.is_empty() {
                    debug!("{thread_id}: evicted {} unterminated frames", frames.len());
                }
                evicted += frames.len() as u64;
            }
        }
        SessionStats::add(&self.stats.unterminated_calls, evicted);
        evicted
    }

    /// Shutdown drain: every remaining open frame is dropped and counted.
    /// In-flight partial calls are never synthesized into edges.
    pub fn drain_all(&mut self) -> u64 {
        let mut dropped = 0u64;
        for stack in self.stacks.values_mut() {
            dropped += stack.drain().len() as u64;
        }
        self.stacks.clear();
        SessionStats::add(&self.stats.unterminated_calls, dropped);
        dropped
    }
}
