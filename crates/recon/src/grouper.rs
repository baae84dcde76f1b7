//! Derive candidate groups from header-keyed rows.

use std::collections::{BTreeSet, HashMap};

use crate::error::SyncError;
use crate::model::{CandidateGroup, Row, RowSet};
use crate::resolver::EntityIndex;

pub const DEFAULT_DELIMITER: &str = "_";

/// Column roles and naming rules for one grouping pass.
#[derive(Debug, Clone)]
pub struct GroupingSpec {
    pub entity_type_column: String,
    pub entity_name_column: String,
    /// Ordered grouping key. Empty means every other column, left to right.
    pub grouping_columns: Vec<String>,
    pub delimiter: String,
    pub prefix: String,
}

impl GroupingSpec {
    pub fn new(entity_type_column: impl Into<String>, entity_name_column: impl Into<String>) -> Self {
        Self {
            entity_type_column: entity_type_column.into(),
            entity_name_column: entity_name_column.into(),
            grouping_columns: Vec::new(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            prefix: String::new(),
        }
    }

    pub fn with_grouping_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grouping_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Check required columns and return the effective grouping key.
    pub fn effective_columns(&self, rows: &RowSet) -> Result<Vec<String>, SyncError> {
        let required = [&self.entity_name_column, &self.entity_type_column]
            .into_iter()
            .chain(self.grouping_columns.iter());
        for column in required {
            if !rows.has_column(column) {
                return Err(SyncError::MissingColumn { column: column.clone() });
            }
        }

        if !self.grouping_columns.is_empty() {
            return Ok(self.grouping_columns.clone());
        }
        Ok(rows
            .columns
            .iter()
            .filter(|c| **c != self.entity_type_column && **c != self.entity_name_column)
            .cloned()
            .collect())
    }

    /// Group rows into candidate groups, in first-seen order of group name
    /// and, within a name, first-seen order of entity type.
    pub fn group(&self, rows: &RowSet) -> Result<Vec<CandidateGroup>, SyncError> {
        let columns = self.effective_columns(rows)?;

        let mut order: Vec<(String, String)> = Vec::new();
        let mut members: HashMap<(String, String), BTreeSet<String>> = HashMap::new();

        for row in &rows.rows {
            let name = self.derive_name(row, &columns);
            if name.is_empty() {
                continue;
            }
            let entity_type = row.get(&self.entity_type_column).cloned().unwrap_or_default();
            let entity_name = row.get(&self.entity_name_column).cloned().unwrap_or_default();

            let key = (name, entity_type);
            let bucket = members.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                BTreeSet::new()
            });
            bucket.insert(entity_name);
        }

        // Regroup so every entity type for a name follows that name's first appearance.
        let mut name_order: Vec<&String> = Vec::new();
        for (name, _) in &order {
            if !name_order.contains(&name) {
                name_order.push(name);
            }
        }

        let mut groups = Vec::with_capacity(order.len());
        for name in name_order {
            for key in order.iter().filter(|(n, _)| n == name) {
                groups.push(CandidateGroup {
                    name: key.0.clone(),
                    entity_type: key.1.clone(),
                    members: members.get(key).cloned().unwrap_or_default(),
                });
            }
        }
        Ok(groups)
    }

    /// Join the row's non-empty grouping values. Empty when every grouping
    /// value is empty, regardless of prefix.
    pub fn derive_name(&self, row: &Row, columns: &[String]) -> String {
        let values: Vec<&str> = columns
            .iter()
            .filter_map(|c| row.get(c).map(String::as_str))
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            return String::new();
        }

        let mut parts = Vec::with_capacity(values.len() + 1);
        if !self.prefix.is_empty() {
            parts.push(self.prefix.as_str());
        }
        parts.extend(values);
        parts.join(&self.delimiter)
    }
}

/// Parse CSV text (first line = header) into a [`RowSet`].
pub fn load_csv_rows(csv_data: &str) -> Result<RowSet, SyncError> {
    let csv_data = csv_data.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SyncError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = RowSet::new(headers);
    for record in reader.records() {
        let record = record.map_err(|e| SyncError::Csv(e.to_string()))?;
        rows.push_values(record.iter());
    }
    Ok(rows)
}

/// Replace each group's members with every known entity of the group's type
/// that the input did NOT list for it.
pub fn complement_groups(groups: &mut [CandidateGroup], entities: &EntityIndex) {
    let fold = |name: &str| {
        if entities.case_sensitive() {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    };
    for group in groups.iter_mut() {
        let listed: BTreeSet<String> = group.members.iter().map(|n| fold(n)).collect();
        group.members = entities
            .names_of_type(&group.entity_type)
            .into_iter()
            .filter(|n| !listed.contains(&fold(n)))
            .collect();
    }
}
