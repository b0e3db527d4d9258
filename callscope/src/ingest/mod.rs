//! Event ingestion: decode, validate and normalize raw probe records
//!
//! The ingestor sits between the agent channel and the correlator. It
//! rejects malformed records by counting them (the stream must survive a
//! misbehaving probe) and assigns per-thread sequence numbers when the
//! agent did not. It performs **no filtering**: filtering decisions belong
//! to downstream components so that raw counts remain available for
//! diagnostics.

use crate::domain::{EntityId, ThreadId, Timestamp};
use crate::session::Session;
use crate::stats::SessionStats;
use callscope_common::{RawRecord, RecordKind};
use log::{debug, warn};
use std::collections::HashMap;
use std::io::BufRead;
use std::sync::Arc;

/// Normalized probe observation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Enter,
    Exit,
}

impl From<RecordKind> for EventKind {
    fn from(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Enter => EventKind::Enter,
            RecordKind::Exit => EventKind::Exit,
        }
    }
}

/// One validated, normalized probe observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub kind: EventKind,
    pub thread_id: ThreadId,
    pub entity: EntityId,
    pub timestamp: Timestamp,
    /// Per-thread monotonic counter; assigned by the ingestor when the
    /// record did not carry one.
    pub sequence: u64,
}

/// Decodes raw records into [`TraceEvent`]s.
///
/// Stateful: tracks per-thread sequence counters for assignment and
/// regression detection. One ingestor per stream.
pub struct Ingestor {
    stats: Arc<SessionStats>,
    next_sequence: HashMap<ThreadId, u64>,
    last_sequence: HashMap<ThreadId, u64>,
}

impl Ingestor {
    pub fn new(stats: Arc<SessionStats>) -> Self {
        Self { stats, next_sequence: HashMap::new(), last_sequence: HashMap::new() }
    }

    /// Decode one JSON record. Malformed input is counted and yields `None`;
    /// the stream continues.
    pub fn decode_line(&mut self, line: &str) -> Option<TraceEvent> {
        match serde_json::from_str::<RawRecord>(line) {
            Ok(record) => self.normalize(record),
            Err(e) => {
                SessionStats::bump(&self.stats.malformed_records);
                debug!("malformed record: {e}");
                None
            }
        }
    }

    /// Validate and normalize an already-decoded record.
    ///
    /// Side effect: assigns `sequence` if absent. A record carrying a
    /// sequence that regressed for its thread is still accepted (the
    /// reconstructor's recovery heuristic deals with the consequences) but
    /// counted as out-of-order.
    pub fn normalize(&mut self, record: RawRecord) -> Option<TraceEvent> {
        if record.function.is_empty() {
            SessionStats::bump(&self.stats.malformed_records);
            warn!("record with empty function name from thread {}", record.thread_id);
            return None;
        }

        let thread_id = ThreadId(record.thread_id);
        let sequence = match record.sequence {
            Some(seq) => {
                if self.last_sequence.get(&thread_id).is_some_and(|last| seq <= *last) {
                    SessionStats::bump(&self.stats.out_of_order);
                }
                seq
            }
            None => {
                let counter = self.next_sequence.entry(thread_id).or_insert(0);
                *counter += 1;
                *counter
            }
        };
        self.last_sequence
            .entry(thread_id)
            .and_modify(|last| *last = (*last).max(sequence))
            .or_insert(sequence);

        Some(TraceEvent {
            kind: record.kind.into(),
            thread_id,
            entity: EntityId::new(record.module, record.function),
            timestamp: Timestamp(record.timestamp),
            sequence,
        })
    }
}

/// Drive a session from a JSON-lines reader (file, stdin, socket...).
///
/// This is the replay-mode counterpart of a live agent channel: one record
/// per line. Blank lines are skipped; undecodable lines are counted as
/// malformed and the stream continues. Only a failing reader stops
/// ingestion.
///
/// Returns the number of lines consumed.
pub fn ingest_reader<R: BufRead>(reader: R, session: &Session) -> std::io::Result<u64> {
    let mut ingestor = Ingestor::new(session.stats_handle());
    let mut lines = 0u64;
    for line in reader.lines() {
        let line = line?;
        lines += 1;
        if line.trim().is_empty() {
            continue;
        }
        if let Some(event) = ingestor.decode_line(&line) {
            session.submit(event);
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingestor() -> (Ingestor, Arc<SessionStats>) {
        let stats = Arc::new(SessionStats::default());
        (Ingestor::new(Arc::clone(&stats)), stats)
    }

    fn record(seq: Option<u64>) -> RawRecord {
        RawRecord {
            kind: RecordKind::Enter,
            thread_id: 1,
            module: "libapp.so".to_string(),
            function: "decode_frame".to_string(),
            timestamp: 100,
            sequence: seq,
        }
    }

    #[test]
    fn test_decode_valid_line() {
        let (mut ingestor, stats) = ingestor();
        let event = ingestor
            .decode_line(
                r#"{"type":"enter","thread_id":7,"module":"m","function":"f","timestamp":42}"#,
            )
            .unwrap();
        assert_eq!(event.kind, EventKind::Enter);
        assert_eq!(event.thread_id, ThreadId(7));
        assert_eq!(event.entity.key(), "m!f");
        assert_eq!(event.timestamp, Timestamp(42));
        assert_eq!(stats.snapshot().malformed_records, 0);
    }

    #[test]
    fn test_malformed_line_is_counted_not_fatal() {
        let (mut ingestor, stats) = ingestor();
        assert!(ingestor.decode_line("{not json").is_none());
        assert!(ingestor.decode_line(r#"{"type":"warp","thread_id":1}"#).is_none());
        assert_eq!(stats.snapshot().malformed_records, 2);
    }

    #[test]
    fn test_empty_function_is_malformed() {
        let (mut ingestor, stats) = ingestor();
        let mut r = record(None);
        r.function = String::new();
        assert!(ingestor.normalize(r).is_none());
        assert_eq!(stats.snapshot().malformed_records, 1);
    }

    #[test]
    fn test_sequence_assigned_per_thread() {
        let (mut ingestor, _) = ingestor();
        let first = ingestor.normalize(record(None)).unwrap();
        let second = ingestor.normalize(record(None)).unwrap();
        let mut other = record(None);
        other.thread_id = 2;
        let other_thread = ingestor.normalize(other).unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(other_thread.sequence, 1);
    }

    #[test]
    fn test_sequence_regression_counts_out_of_order() {
        let (mut ingestor, stats) = ingestor();
        ingestor.normalize(record(Some(5))).unwrap();
        ingestor.normalize(record(Some(3))).unwrap();
        ingestor.normalize(record(Some(6))).unwrap();
        assert_eq!(stats.snapshot().out_of_order, 1);
    }
}
