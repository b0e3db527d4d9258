//! CLI argument definitions

use crate::correlate::MatchStrategy;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "callscope",
    about = "Correlate function entry/exit probe events into a weighted call graph",
    after_help = "\
EXAMPLES:
    callscope events.jsonl --json graph.json             Replay a recorded stream
    agent | callscope - --json graph.json                Correlate a live agent pipe
    callscope events.jsonl --policy filters.json \\
        --json graph.json --graphml graph.graphml        Filtered, both formats"
)]
pub struct Args {
    /// Event stream to ingest: JSON-lines file, or `-` for stdin
    #[arg(value_name = "EVENTS", default_value = "-")]
    pub events: String,

    /// Filter policy document (JSON); default-allow when omitted
    #[arg(short, long, value_name = "FILE")]
    pub policy: Option<PathBuf>,

    /// Write the call graph as JSON
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Write the call graph as GraphML
    #[arg(long, value_name = "FILE")]
    pub graphml: Option<PathBuf>,

    /// Evict call stacks idle for longer than this (event time)
    #[arg(long, default_value = "30000", value_name = "MS")]
    pub idle_timeout_ms: u64,

    /// Bounded event buffer between ingestion and correlation
    #[arg(long, default_value = "65536", value_name = "EVENTS")]
    pub buffer_size: usize,

    /// Which open frame an exit closes when recursion leaves several
    /// candidates
    #[arg(long, value_enum, default_value = "innermost")]
    pub depth_match: DepthMatch,

    /// Print ranked functions and call relationships after ingestion
    #[arg(long)]
    pub summary: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DepthMatch {
    Innermost,
    Outermost,
}

impl From<DepthMatch> for MatchStrategy {
    fn from(value: DepthMatch) -> Self {
        match value {
            DepthMatch::Innermost => MatchStrategy::Innermost,
            DepthMatch::Outermost => MatchStrategy::Outermost,
        }
    }
}
