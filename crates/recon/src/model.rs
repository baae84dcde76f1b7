use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single input row: column name -> raw cell value.
pub type Row = HashMap<String, String>;

/// Header-keyed rows. `columns` preserves the left-to-right header order,
/// which drives the default grouping key.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Append a row given as values in header order. Missing trailing
    /// values become empty strings.
    pub fn push_values<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values = values.into_iter();
        let row = self
            .columns
            .iter()
            .map(|c| (c.clone(), values.next().map(Into::into).unwrap_or_default()))
            .collect();
        self.rows.push(row);
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Candidate groups
// ---------------------------------------------------------------------------

/// A group derived from the input: one per (derived name, entity type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateGroup {
    pub name: String,
    pub entity_type: String,
    /// Entity names before resolution, identifiers after.
    pub members: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Remote directory records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub identifier: String,
    pub name: String,
    pub entity_type: String,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRecord {
    pub identifier: String,
    pub name: String,
    pub entity_type: String,
    /// Lifecycle state as reported by the directory (e.g. `ACTIVE`).
    pub state: Option<String>,
}

impl EntityRecord {
    pub fn is_active(&self) -> bool {
        self.state.as_deref() == Some("ACTIVE")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberRecord {
    pub identifier: String,
    pub name: String,
}

/// A name that resolved to zero or several identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ambiguity {
    pub name: String,
    pub entity_type: String,
    pub matches: usize,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SyncMeta {
    pub engine_version: String,
    pub run_at: String,
    pub dry_run: bool,
    pub delete_mode: bool,
    pub groups: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub meta: SyncMeta,
    pub changes: crate::tracker::ChangeSnapshot,
}
