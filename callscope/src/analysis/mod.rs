//! Summary statistics over a graph snapshot
//!
//! Aggregates a [`GraphView`] into the ranked lists an operator wants at
//! session end: which functions were called most and which call
//! relationships dominate. Pure post-processing; works on the snapshot,
//! never on live aggregator state.

use crate::graph::GraphView;
use log::info;

/// How many entries each ranked list keeps.
const TOP_N: usize = 10;

/// Ranked overview of one snapshot.
#[derive(Debug, Clone)]
pub struct GraphSummary {
    pub total_calls: u64,
    pub unique_functions: usize,
    pub unique_calls: usize,
    /// `(node id, call_count)`, most called first.
    pub most_called: Vec<(String, u64)>,
    /// `(node id, total_duration ns)`, heaviest first.
    pub longest_running: Vec<(String, u64)>,
    /// `(source, target, call_count)`, most frequent first.
    pub busiest_edges: Vec<(String, String, u64)>,
}

/// Rank a snapshot's nodes and edges.
pub fn summarize(view: &GraphView) -> GraphSummary {
    let mut most_called: Vec<(String, u64)> =
        view.nodes.iter().map(|n| (n.id.clone(), n.call_count)).collect();
    most_called.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    most_called.truncate(TOP_N);

    let mut longest_running: Vec<(String, u64)> =
        view.nodes.iter().map(|n| (n.id.clone(), n.total_duration)).collect();
    longest_running.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    longest_running.truncate(TOP_N);

    let mut busiest_edges: Vec<(String, String, u64)> =
        view.edges.iter().map(|e| (e.source.clone(), e.target.clone(), e.call_count)).collect();
    busiest_edges.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| (&a.0, &a.1).cmp(&(&b.0, &b.1))));
    busiest_edges.truncate(TOP_N);

    GraphSummary {
        total_calls: view.metadata.total_calls,
        unique_functions: view.nodes.len(),
        unique_calls: view.edges.len(),
        most_called,
        longest_running,
        busiest_edges,
    }
}

impl GraphSummary {
    /// Log the summary through the standard logger.
    pub fn log(&self) {
        info!(
            "graph: {} calls, {} functions, {} relationships",
            self.total_calls, self.unique_functions, self.unique_calls
        );
        for (id, count) in &self.most_called {
            info!("  most called: {id} ({count} calls)");
        }
        for (source, target, count) in &self.busiest_edges {
            info!("  busiest: {source} -> {target} ({count} calls)");
        }
    }
}
