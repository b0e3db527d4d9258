//! GraphML export
//!
//! A directed graph document with node and edge attributes equivalent to
//! the JSON fields, consumable by general-purpose graph tools (Gephi,
//! yEd...). Hand-written serialization: the format is small and fixed, and
//! every value passes through [`escape`].
//!
//! GraphML requires every edge endpoint to be a declared node, so a
//! synthetic `root` node is emitted when any depth-0 edge is present.

use crate::domain::ExportError;
use crate::graph::{GraphView, ROOT_ID};
use std::fmt::Write as _;
use std::io::Write;

const HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
    <graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n";

/// Attribute key declarations, ids in document order. Names match the JSON
/// field names.
const KEYS: &[(&str, &str, &str, &str)] = &[
    ("d0", "node", "name", "string"),
    ("d1", "node", "module", "string"),
    ("d2", "node", "call_count", "long"),
    ("d3", "node", "total_duration", "long"),
    ("d4", "node", "avg_duration", "double"),
    ("d5", "edge", "call_count", "long"),
    ("d6", "edge", "total_duration", "long"),
    ("d7", "edge", "avg_duration", "double"),
];

/// Serialize a snapshot to GraphML bytes.
pub fn to_graphml(view: &GraphView) -> Result<Vec<u8>, ExportError> {
    let mut out = String::with_capacity(1024);
    render(view, &mut out)
        .map_err(|e| ExportError::SerializationFailed(e.to_string()))?;
    Ok(out.into_bytes())
}

/// Serialize a snapshot to any writer.
pub fn write_graphml<W: Write>(view: &GraphView, mut writer: W) -> Result<(), ExportError> {
    writer.write_all(&to_graphml(view)?)?;
    Ok(())
}

fn render(view: &GraphView, out: &mut String) -> std::fmt::Result {
    out.push_str(HEADER);
    for (id, target, name, ty) in KEYS {
        writeln!(
            out,
            "  <key id=\"{id}\" for=\"{target}\" attr.name=\"{name}\" attr.type=\"{ty}\"/>"
        )?;
    }
    out.push_str("  <graph edgedefault=\"directed\">\n");

    if view.edges.iter().any(|e| e.source == ROOT_ID) {
        writeln!(out, "    <node id=\"{ROOT_ID}\"/>")?;
    }
    for node in &view.nodes {
        writeln!(out, "    <node id=\"{}\">", escape(&node.id))?;
        writeln!(out, "      <data key=\"d0\">{}</data>", escape(&node.name))?;
        writeln!(out, "      <data key=\"d1\">{}</data>", escape(&node.module))?;
        writeln!(out, "      <data key=\"d2\">{}</data>", node.call_count)?;
        writeln!(out, "      <data key=\"d3\">{}</data>", node.total_duration)?;
        writeln!(out, "      <data key=\"d4\">{}</data>", node.avg_duration)?;
        out.push_str("    </node>\n");
    }
    for edge in &view.edges {
        writeln!(
            out,
            "    <edge source=\"{}\" target=\"{}\">",
            escape(&edge.source),
            escape(&edge.target)
        )?;
        writeln!(out, "      <data key=\"d5\">{}</data>", edge.call_count)?;
        writeln!(out, "      <data key=\"d6\">{}</data>", edge.total_duration)?;
        writeln!(out, "      <data key=\"d7\">{}</data>", edge.avg_duration)?;
        out.push_str("    </edge>\n");
    }

    out.push_str("  </graph>\n</graphml>\n");
    Ok(())
}

/// Escape a value for use in XML text and attribute positions.
fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::CallEdge;
    use crate::domain::{Duration, EntityId, Timestamp};
    use crate::filter::CountBounds;
    use crate::graph::Aggregator;

    fn view_with(edges: &[(Option<&str>, &str)]) -> GraphView {
        let agg = Aggregator::new();
        for (caller, callee) in edges {
            agg.record(&CallEdge {
                caller: caller.map(|c| EntityId::new("libapp.so", c)),
                callee: EntityId::new("libapp.so", *callee),
                enter_time: Timestamp(0),
                duration: Duration(5),
                depth: 0,
            });
        }
        agg.snapshot(CountBounds::default())
    }

    #[test]
    fn test_document_declares_all_nodes_and_edges() {
        let view = view_with(&[(None, "a"), (Some("a"), "b")]);
        let doc = String::from_utf8(to_graphml(&view).unwrap()).unwrap();

        // 2 entities + synthetic root
        assert_eq!(doc.matches("<node ").count(), 3);
        assert_eq!(doc.matches("<edge ").count(), 2);
        assert!(doc.contains("<node id=\"root\"/>"));
        assert!(doc.contains("edgedefault=\"directed\""));
        assert!(doc.contains("attr.name=\"avg_duration\""));
    }

    #[test]
    fn test_no_synthetic_root_without_root_edges() {
        let view = view_with(&[(Some("a"), "b")]);
        let doc = String::from_utf8(to_graphml(&view).unwrap()).unwrap();
        assert!(!doc.contains("<node id=\"root\"/>"));
    }

    #[test]
    fn test_escapes_xml_metacharacters() {
        let agg = Aggregator::new();
        agg.record(&CallEdge {
            caller: None,
            callee: EntityId::new("lib<core>.so", "operator&\"quote'"),
            enter_time: Timestamp(0),
            duration: Duration(1),
            depth: 0,
        });
        let doc =
            String::from_utf8(to_graphml(&agg.snapshot(CountBounds::default())).unwrap()).unwrap();

        assert!(doc.contains("lib&lt;core&gt;.so"));
        assert!(doc.contains("operator&amp;&quot;quote&apos;"));
        assert!(!doc.contains("lib<core>"));
    }

    #[test]
    fn test_export_is_idempotent() {
        let view = view_with(&[(None, "a")]);
        assert_eq!(to_graphml(&view).unwrap(), to_graphml(&view).unwrap());
    }
}
