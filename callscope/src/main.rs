//! # callscope - Main Entry Point
//!
//! Reads a probe event stream (file or stdin), correlates it into a call
//! graph under an optional filter policy, and exports JSON and/or GraphML
//! snapshots.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::{BufReader, BufWriter};

use callscope::cli::Args;
use callscope::correlate::ReconstructorConfig;
use callscope::domain::{Duration, PolicyError};
use callscope::export::{write_graphml, write_json};
use callscope::filter::{FilterEngine, FilterPolicy};
use callscope::ingest::ingest_reader;
use callscope::session::{Session, SessionConfig};
use callscope::{analysis, graph::GraphView};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for(&e)
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    // An unusable policy is a configuration mistake, not a runtime failure
    if err.downcast_ref::<PolicyError>().is_some() {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn load_filter(args: &Args) -> Result<FilterEngine> {
    match &args.policy {
        Some(path) => {
            let policy = FilterPolicy::from_file(path)
                .with_context(|| format!("Failed to load policy {}", path.display()))?;
            Ok(FilterEngine::compile(&policy)?)
        }
        None => Ok(FilterEngine::allow_all()),
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let filter = load_filter(&args)?;
    let config = SessionConfig {
        buffer_size: args.buffer_size,
        reconstructor: ReconstructorConfig {
            idle_timeout: Duration::from_millis(args.idle_timeout_ms),
            match_strategy: args.depth_match.into(),
            ..Default::default()
        },
    };
    let mut session = Session::start(filter, config);

    let lines = if args.events == "-" {
        let stdin = std::io::stdin();
        ingest_reader(stdin.lock(), &session).context("Failed to read event stream from stdin")?
    } else {
        let file = File::open(&args.events)
            .with_context(|| format!("Failed to open event stream {}", args.events))?;
        ingest_reader(BufReader::new(file), &session)
            .with_context(|| format!("Failed to read event stream {}", args.events))?
    };

    session.finish();
    let view = session.snapshot();
    info!(
        "correlated {lines} lines into {} nodes, {} edges",
        view.nodes.len(),
        view.edges.len()
    );

    export(&args, &view)?;

    if args.summary {
        analysis::summarize(&view).log();
    }
    if !args.quiet {
        eprintln!("{}", session.stats());
    }
    Ok(())
}

fn export(args: &Args, view: &GraphView) -> Result<()> {
    if let Some(path) = &args.json {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_json(view, BufWriter::new(file))
            .with_context(|| format!("Failed to export JSON to {}", path.display()))?;
        info!("call graph saved to {}", path.display());
    }
    if let Some(path) = &args.graphml {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_graphml(view, BufWriter::new(file))
            .with_context(|| format!("Failed to export GraphML to {}", path.display()))?;
        info!("call graph saved to {}", path.display());
    }
    Ok(())
}
