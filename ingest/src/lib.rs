//! Recorded-trace ingestion: the on-disk record format and its conversion
//! into a validated replay trace.
//!
//! A recording is JSON lines, one record per relaxation/visit step. Each
//! record's `forward` block describes the creation of a FROM point (the node
//! being expanded) and a TO point (the neighbour reached); the `inverse`
//! block removes exactly those two points. Point metadata is a display text
//! whose layout is preserved **bit-for-bit** across parse and re-render, so
//! existing recordings stay compatible.

use std::fmt;
use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use replay::event::{EntityKind, GeoPoint, Mutation, Slot, TraceEvent};
use replay::trace::{Trace, TraceError};

/// Errors from reading, writing, or interpreting recorded traces.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The underlying reader or writer failed.
    #[error("failed to read trace records: {0}")]
    Io(#[from] std::io::Error),
    /// A line did not parse as a record. Line numbers are 1-based.
    #[error("line {line}: invalid record: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
    /// A record did not serialize. Does not happen for well-formed records.
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    /// Metadata text does not follow the recorded layout.
    #[error("metadata text missing `{0}` field")]
    MetaMissingField(&'static str),
    /// A `Timestamp(` in metadata text was never closed.
    #[error("metadata timestamp is not closed in {0:?}")]
    MetaUnclosedTimestamp(String),
}

/// Parsed display metadata for a recorded point.
///
/// All fields are opaque strings; the engine never interprets ids, ranks,
/// or timestamps. The recorded layout is one of:
///
/// ```text
/// id: 24421, rank: 43476, at: Timestamp(84775.57)
/// id: 24421, rank: 43476
/// ```
///
/// The `at` timestamp appears only on FROM points. [`PointMeta::parse`] and
/// the [`fmt::Display`] impl round-trip these layouts exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointMeta {
    pub id: String,
    pub rank: String,
    /// Literal inside `Timestamp(...)`, if present.
    pub at: Option<String>,
}

impl PointMeta {
    /// Parse metadata text in the recorded layout.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::MetaMissingField`] when the `id` or `rank`
    /// markers are absent and [`IngestError::MetaUnclosedTimestamp`] when a
    /// timestamp suffix never closes its parenthesis.
    pub fn parse(text: &str) -> Result<Self, IngestError> {
        let rest = text
            .strip_prefix("id: ")
            .ok_or(IngestError::MetaMissingField("id"))?;
        let (id, rest) = rest
            .split_once(", rank: ")
            .ok_or(IngestError::MetaMissingField("rank"))?;
        match rest.split_once(", at: Timestamp(") {
            Some((rank, at)) => {
                let at = at
                    .strip_suffix(')')
                    .ok_or_else(|| IngestError::MetaUnclosedTimestamp(text.to_owned()))?;
                Ok(Self {
                    id: id.to_owned(),
                    rank: rank.to_owned(),
                    at: Some(at.to_owned()),
                })
            }
            None => Ok(Self {
                id: id.to_owned(),
                rank: rest.to_owned(),
                at: None,
            }),
        }
    }
}

impl fmt::Display for PointMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id: {}, rank: {}", self.id, self.rank)?;
        if let Some(at) = &self.at {
            write!(f, ", at: Timestamp({at})")?;
        }
        Ok(())
    }
}

/// Which of a record's two points an inverse removal names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointRole {
    From,
    To,
}

/// One point of a recorded step, as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    /// `[lat, lon]` in decimal degrees.
    pub position: [f64; 2],
    pub label: String,
    /// Display metadata text, preserved bit-for-bit.
    pub meta: String,
    /// Optional display styling, carried through untouched.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub style: serde_json::Value,
}

/// A record's forward block: the two points one step creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardBlock {
    pub from: PointRecord,
    pub to: PointRecord,
}

/// A record's inverse block: which points to remove, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverseBlock {
    pub remove: Vec<PointRole>,
}

/// One recorded relaxation/visit step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub forward: ForwardBlock,
    pub inverse: InverseBlock,
}

/// Read JSON-lines records. Blank lines are skipped; parse errors carry the
/// 1-based line number.
///
/// # Errors
///
/// Returns [`IngestError::Io`] for reader failures and
/// [`IngestError::Json`] for lines that are not valid records.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<TraceRecord>, IngestError> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| IngestError::Json {
            line: index + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Write records as JSON lines, one record per line.
///
/// # Errors
///
/// Returns [`IngestError::Io`] for writer failures.
pub fn write_records<W: Write>(mut writer: W, records: &[TraceRecord]) -> Result<(), IngestError> {
    for record in records {
        let line = serde_json::to_string(record)?;
        writeln!(writer, "{line}")?;
    }
    Ok(())
}

/// Expand a record into its forward/inverse mutation lists.
///
/// Forward order is fixed by the recorded format: create FROM, set FROM
/// metadata, create TO, set TO metadata. FROM is always slot 0 and TO
/// slot 1. Inverse removals follow the record's `remove` list; recorded
/// data removes in reverse creation order.
#[must_use]
pub fn record_to_event(record: &TraceRecord) -> TraceEvent {
    let from = &record.forward.from;
    let to = &record.forward.to;
    let forward = vec![
        Mutation::CreateEntity {
            kind: EntityKind::From,
            position: GeoPoint::new(from.position[0], from.position[1]),
            label: from.label.clone(),
            style: from.style.clone(),
        },
        Mutation::SetMetadata {
            slot: Slot(0),
            text: from.meta.clone(),
        },
        Mutation::CreateEntity {
            kind: EntityKind::To,
            position: GeoPoint::new(to.position[0], to.position[1]),
            label: to.label.clone(),
            style: to.style.clone(),
        },
        Mutation::SetMetadata {
            slot: Slot(1),
            text: to.meta.clone(),
        },
    ];
    let inverse = record
        .inverse
        .remove
        .iter()
        .map(|role| Mutation::RemoveEntity {
            slot: match role {
                PointRole::From => Slot(0),
                PointRole::To => Slot(1),
            },
        })
        .collect();
    TraceEvent { forward, inverse }
}

/// Build a validated trace from recorded steps.
///
/// # Errors
///
/// Returns [`TraceError::Corrupt`] if any record's inverse does not undo
/// its forward (validation runs once here, before any cursor exists).
pub fn build_trace(records: &[TraceRecord]) -> Result<Trace, TraceError> {
    Trace::from_events(records.iter().map(record_to_event).collect())
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
