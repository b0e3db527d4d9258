//! # Wire Records (Instrumentation Agent ↔ Correlator)
//!
//! Defines the record format shared between the instrumentation agent running
//! inside the traced process and the host-side correlator. The agent emits one
//! [`RawRecord`] per probe observation, serialized as a JSON object; the
//! correlator's ingestor decodes, validates and normalizes them.
//!
//! The schema is intentionally minimal: how probes attach to functions and how
//! symbols are resolved is the agent's concern. The correlator only requires
//! that each record identifies the observation kind, the emitting thread, the
//! traced entity and a monotonic timestamp.
//!
//! ## Key Types
//!
//! - [`RawRecord`] - One probe observation as it crosses the agent boundary
//! - [`RecordKind`] - Whether the probe fired on function entry or exit

use serde::{Deserialize, Serialize};

/// Schema version understood by this correlator.
///
/// Bumped when the record layout changes incompatibly. Agents may include a
/// `version` field in a stream preamble; the correlator itself only checks
/// record shape.
pub const WIRE_VERSION: u32 = 1;

/// Probe observation kind.
///
/// An `enter` record fires when control flows into an instrumented function,
/// an `exit` record when it returns (or unwinds through the probe). Records
/// with any other kind string fail decoding and are counted as malformed by
/// the ingestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Enter,
    Exit,
}

/// One raw probe observation as emitted by the agent.
///
/// **Field notes**:
/// - `thread_id` is an opaque identifier, stable for the process lifetime.
///   The correlator never interprets it beyond equality.
/// - `timestamp` is a monotonic nanosecond instant in the traced process's
///   clock domain. The correlator compares timestamps only against each
///   other, never against host wall-clock time.
/// - `sequence` is an optional per-thread monotonic counter. Agents that can
///   stamp it enable out-of-order delivery detection; when absent the
///   ingestor assigns one in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Observation kind (`"enter"` or `"exit"`).
    #[serde(rename = "type")]
    pub kind: RecordKind,

    /// Emitting thread, opaque and stable for the process lifetime.
    pub thread_id: u64,

    /// Module (library, dex, package...) containing the traced function.
    pub module: String,

    /// Function name within the module.
    pub function: String,

    /// Monotonic nanosecond timestamp in the traced process's clock domain.
    pub timestamp: u64,

    /// Per-thread monotonic counter, assigned by the ingestor when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trips_through_json() {
        let record = RawRecord {
            kind: RecordKind::Enter,
            thread_id: 42,
            module: "libapp.so".to_string(),
            function: "decode_frame".to_string(),
            timestamp: 1_000,
            sequence: Some(7),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: RawRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_kind_uses_wire_spelling() {
        let json = r#"{"type":"exit","thread_id":1,"module":"m","function":"f","timestamp":5}"#;
        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, RecordKind::Exit);
        assert_eq!(record.sequence, None);
    }

    #[test]
    fn test_unknown_kind_fails_decoding() {
        let json = r#"{"type":"sample","thread_id":1,"module":"m","function":"f","timestamp":5}"#;
        assert!(serde_json::from_str::<RawRecord>(json).is_err());
    }
}
