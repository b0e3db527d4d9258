//! # callscope - Trace Event Correlator & Call Graph Aggregator
//!
//! callscope consumes the stream of function entry/exit events produced by
//! instrumentation probes inside a traced process and reconstructs a
//! directed call graph annotated with frequency and timing statistics. The
//! stream is unordered across threads, possibly lossy, and unbounded;
//! callscope turns it into a causally-consistent weighted graph that can be
//! queried and exported while still being updated.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Instrumentation Agent                       │
//! │            (probes inside the traced process)                   │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ raw records (JSON lines)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    callscope (This Crate)                       │
//! │                                                                 │
//! │  ┌──────────┐   ┌──────────────┐   ┌────────────┐             │
//! │  │  Ingest  │──▶│  Correlate   │──▶│   Graph    │             │
//! │  │ (decode) │   │ (per-thread  │   │ (weighted  │             │
//! │  └──────────┘   │   stacks)    │   │  digraph)  │             │
//! │                 └──────┬───────┘   └─────┬──────┘             │
//! │                        │                  │ snapshot           │
//! │                 ┌──────▼───────┐   ┌─────▼──────┐             │
//! │                 │    Filter    │   │   Export   │             │
//! │                 │  (patterns,  │   │ (JSON,     │             │
//! │                 │   depth)     │   │  GraphML)  │             │
//! │                 └──────────────┘   └────────────┘             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`ingest`]: decode and normalize raw probe records; malformed input is
//!   counted, never fatal
//! - [`correlate`]: per-thread call-stack reconstruction with recovery for
//!   mismatched exits and idle eviction for dead threads
//! - [`filter`]: pattern/depth policy consulted during reconstruction;
//!   count thresholds applied at snapshot time
//! - [`graph`]: the authoritative node/edge tables with bounded-lock
//!   snapshots
//! - [`export`]: JSON and GraphML serialization of snapshots
//! - [`analysis`]: ranked summaries of a snapshot
//! - [`session`]: pipeline wiring (bounded channel, correlator thread,
//!   drop-newest backpressure, drain-on-stop)
//! - [`stats`]: shared diagnostic counters
//! - [`domain`]: core newtypes and error enums
//! - [`cli`]: command-line argument parsing
//!
//! ## Correlation Model
//!
//! Call stacks are reconstructed per thread: synchronous call/return
//! instrumentation is inherently single-thread-local, so only total order
//! within one thread matters and cross-thread calls are never correlated.
//! Completed calls become caller→callee edges attributed to the nearest
//! unfiltered ancestor; anomalies (missing enters, unterminated calls,
//! malformed records) are folded into documented counters instead of
//! corrupting graph statistics.

// Expose modules for testing
pub mod analysis;
pub mod cli;
pub mod correlate;
pub mod domain;
pub mod export;
pub mod filter;
pub mod graph;
pub mod ingest;
pub mod session;
pub mod stats;
