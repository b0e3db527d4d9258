//! The authoritative call graph: aggregation and snapshots
//!
//! The graph is two flat mappings (entity → node stats, ordered pair → edge
//! stats) rather than an object graph with back-references: ownership is
//! unambiguous, and a snapshot is a structural copy, not a pointer
//! traversal. Insertion order is tracked separately so exports are
//! reproducible.
//!
//! Node and edge creation is monotonic: once observed, an entity persists
//! for the session even if current traffic has none for a period, so that
//! historical totals remain correct.
//!
//! ## Locking
//!
//! Writers (the correlator thread) and snapshot readers share one mutex,
//! but every critical section is bounded: `record` touches two nodes and
//! one edge, `snapshot` clones the tables and builds the view after
//! unlocking. Serialization to an export format never happens under the
//! lock.

// Average durations intentionally convert u64 to f64
#![allow(clippy::cast_precision_loss)]

use crate::correlate::CallEdge;
use crate::domain::{Duration, EntityId, Timestamp};
use crate::filter::CountBounds;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Export id used as the edge source for depth-0 calls.
pub const ROOT_ID: &str = "root";

/// Running (count, total duration) pair for one node or edge.
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    call_count: u64,
    total_duration: Duration,
}

impl Tally {
    fn add(&mut self, duration: Duration) {
        self.call_count += 1;
        self.total_duration += duration;
    }

    fn avg(&self) -> f64 {
        if self.call_count == 0 {
            0.0
        } else {
            self.total_duration.0 as f64 / self.call_count as f64
        }
    }
}

type EdgeKey = (Option<EntityId>, EntityId);

#[derive(Debug, Clone, Default)]
struct GraphTables {
    nodes: HashMap<EntityId, Tally>,
    node_order: Vec<EntityId>,
    edges: HashMap<EdgeKey, Tally>,
    edge_order: Vec<EdgeKey>,
    total_calls: u64,
    window: Option<(Timestamp, Timestamp)>,
}

impl GraphTables {
    fn node_mut(&mut self, entity: &EntityId) -> &mut Tally {
        match self.nodes.entry(entity.clone()) {
            Entry::Vacant(vacant) => {
                self.node_order.push(entity.clone());
                vacant.insert(Tally::default())
            }
            Entry::Occupied(occupied) => occupied.into_mut(),
        }
    }

    fn edge_mut(&mut self, key: &EdgeKey) -> &mut Tally {
        match self.edges.entry(key.clone()) {
            Entry::Vacant(vacant) => {
                self.edge_order.push(key.clone());
                vacant.insert(Tally::default())
            }
            Entry::Occupied(occupied) => occupied.into_mut(),
        }
    }

    fn extend_window(&mut self, ts: Timestamp) {
        self.window = Some(match self.window {
            Some((start, end)) => (start.min(ts), end.max(ts)),
            None => (ts, ts),
        });
    }
}

/// Owns the graph tables; shared between the correlator thread (writes)
/// and snapshot readers.
#[derive(Debug, Default)]
pub struct Aggregator {
    inner: Mutex<GraphTables>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one completed call into the graph.
    ///
    /// Always safe to call; repeated observations of the same ordered pair
    /// increment the existing edge, never duplicate it.
    pub fn record(&self, edge: &CallEdge) {
        let mut tables = self.inner.lock().expect("graph lock poisoned");
        if let Some(caller) = &edge.caller {
            tables.node_mut(caller);
        }
        tables.node_mut(&edge.callee).add(edge.duration);

        let key = (edge.caller.clone(), edge.callee.clone());
        tables.edge_mut(&key).add(edge.duration);

        tables.total_calls += 1;
        tables.extend_window(edge.enter_time);
        tables.extend_window(Timestamp(edge.enter_time.0 + edge.duration.0));
    }

    /// Extend the observation window with an ingested event's timestamp.
    pub fn touch(&self, ts: Timestamp) {
        self.inner.lock().expect("graph lock poisoned").extend_window(ts);
    }

    /// Point-in-time immutable view, safe to export while ingestion
    /// continues. Count bounds are applied here, against final counts:
    /// edges outside the bounds are omitted, nodes outside the bounds are
    /// omitted unless a retained edge still references them. Internal
    /// tallies are untouched; a later snapshot can resurface a pair once
    /// its count clears the threshold.
    pub fn snapshot(&self, bounds: CountBounds) -> GraphView {
        let tables = self.inner.lock().expect("graph lock poisoned").clone();
        // lock released; view construction happens on the copy

        let edges: Vec<EdgeView> = tables
            .edge_order
            .iter()
            .filter_map(|key| {
                let tally = tables.edges[key];
                bounds.admits(tally.call_count).then(|| EdgeView {
                    source: key.0.as_ref().map_or_else(|| ROOT_ID.to_string(), EntityId::key),
                    target: key.1.key(),
                    call_count: tally.call_count,
                    total_duration: tally.total_duration.0,
                    avg_duration: tally.avg(),
                })
            })
            .collect();

        let referenced: HashSet<&str> =
            edges.iter().flat_map(|e| [e.source.as_str(), e.target.as_str()]).collect();

        let nodes: Vec<NodeView> = tables
            .node_order
            .iter()
            .filter_map(|entity| {
                let tally = tables.nodes[entity];
                let id = entity.key();
                let keep = bounds.admits(tally.call_count) || referenced.contains(id.as_str());
                keep.then(|| NodeView {
                    id,
                    name: entity.function().to_string(),
                    module: entity.module().to_string(),
                    call_count: tally.call_count,
                    total_duration: tally.total_duration.0,
                    avg_duration: tally.avg(),
                })
            })
            .collect();

        let (start_time, end_time) = match tables.window {
            Some((start, end)) => (Some(start.0), Some(end.0)),
            None => (None, None),
        };
        GraphView {
            nodes,
            edges,
            metadata: GraphMetadata {
                total_calls: tables.total_calls,
                start_time,
                end_time,
                duration: end_time.unwrap_or(0).saturating_sub(start_time.unwrap_or(0)),
            },
        }
    }
}

/// Immutable, export-ready view of the graph at one instant.
///
/// Field order here is the JSON document order; both exporters consume this
/// and never touch aggregator state.
#[derive(Debug, Clone, Serialize)]
pub struct GraphView {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
    pub metadata: GraphMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    /// Deterministic key `module!function`, stable within a session.
    pub id: String,
    pub name: String,
    pub module: String,
    pub call_count: u64,
    /// Nanoseconds.
    pub total_duration: u64,
    /// Nanoseconds, `total_duration / call_count`.
    pub avg_duration: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeView {
    /// Caller id, or `"root"` for depth-0 calls.
    pub source: String,
    pub target: String,
    pub call_count: u64,
    pub total_duration: u64,
    pub avg_duration: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphMetadata {
    pub total_calls: u64,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub duration: u64,
}
