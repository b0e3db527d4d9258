//! JSON export
//!
//! Produces the `{nodes, edges, metadata}` document. Node and edge order is
//! the graph's insertion order, so diffs between exports of the same
//! session are stable.

use crate::domain::ExportError;
use crate::graph::GraphView;
use std::io::Write;

/// Serialize a snapshot to pretty-printed JSON bytes.
pub fn to_json(view: &GraphView) -> Result<Vec<u8>, ExportError> {
    Ok(serde_json::to_vec_pretty(view)?)
}

/// Serialize a snapshot to any writer (file, stdout, buffer...).
pub fn write_json<W: Write>(view: &GraphView, mut writer: W) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, view)?;
    writer.write_all(b"\n")?;
    Ok(())
}
