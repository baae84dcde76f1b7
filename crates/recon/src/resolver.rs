//! Name -> identifier resolution against the directory.
//!
//! Two batch indexes are built once per run so the per-group path is a
//! local lookup. `resolve_name` / `resolve_group_identifier` are the
//! one-call-per-name fallbacks used by incremental operations.
//!
//! With `case_sensitive = false` index keys are lower-cased, so two distinct
//! entities whose names differ only by case share a bucket and resolve as
//! ambiguous. That collapse is intended.

use std::collections::{BTreeSet, HashMap};

use crate::directory::Directory;
use crate::error::{DirectoryError, ResolveError};
use crate::model::{Ambiguity, EntityRecord, GroupRecord};

// ---------------------------------------------------------------------------
// Indexes
// ---------------------------------------------------------------------------

/// Remote groups bucketed by display name.
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    by_name: HashMap<String, Vec<GroupRecord>>,
}

impl GroupIndex {
    pub fn from_records(records: impl IntoIterator<Item = GroupRecord>) -> Self {
        let mut by_name: HashMap<String, Vec<GroupRecord>> = HashMap::new();
        for record in records {
            by_name.entry(record.name.clone()).or_default().push(record);
        }
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> &[GroupRecord] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Groups named `name` that hold `entity_type`. Groups of other types
    /// sharing the name are a different group.
    pub fn get_typed(&self, name: &str, entity_type: &str) -> Vec<&GroupRecord> {
        self.get(name)
            .iter()
            .filter(|g| g.entity_type == entity_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Outcome of looking a member name up in the [`EntityIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityMatch {
    Found(String),
    Missing(Ambiguity),
    Ambiguous(Ambiguity),
    /// Several matches, none or more than one of them active (active-only mode).
    AmbiguousActive(Ambiguity),
}

/// Entities bucketed by type, then by (possibly lower-cased) name.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    case_sensitive: bool,
    by_type: HashMap<String, HashMap<String, Vec<EntityRecord>>>,
}

impl EntityIndex {
    pub fn from_records(records: impl IntoIterator<Item = EntityRecord>, case_sensitive: bool) -> Self {
        let mut by_type: HashMap<String, HashMap<String, Vec<EntityRecord>>> = HashMap::new();
        for record in records {
            let key = index_key(&record.name, case_sensitive);
            by_type
                .entry(record.entity_type.clone())
                .or_default()
                .entry(key)
                .or_default()
                .push(record);
        }
        Self { case_sensitive, by_type }
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// All entries filed under `name` for `entity_type`.
    pub fn get(&self, entity_type: &str, name: &str) -> &[EntityRecord] {
        self.by_type
            .get(entity_type)
            .and_then(|names| names.get(&index_key(name, self.case_sensitive)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn lookup(&self, entity_type: &str, name: &str, active_only: bool) -> EntityMatch {
        let matches = self.get(entity_type, name);
        let ambiguity = |matches: usize| Ambiguity {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            matches,
        };

        match matches {
            [] => EntityMatch::Missing(ambiguity(0)),
            [only] => EntityMatch::Found(only.identifier.clone()),
            many if active_only => {
                let active: Vec<&EntityRecord> = many.iter().filter(|e| e.is_active()).collect();
                match active.as_slice() {
                    [only] => EntityMatch::Found(only.identifier.clone()),
                    _ => EntityMatch::AmbiguousActive(ambiguity(many.len())),
                }
            }
            many => EntityMatch::Ambiguous(ambiguity(many.len())),
        }
    }

    /// Display names of every indexed entity of `entity_type`.
    pub fn names_of_type(&self, entity_type: &str) -> BTreeSet<String> {
        self.by_type
            .get(entity_type)
            .map(|names| names.values().flatten().map(|e| e.name.clone()).collect())
            .unwrap_or_default()
    }
}

fn index_key(name: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        name.to_string()
    } else {
        name.to_lowercase()
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

pub struct IdentityResolver<'d, D: Directory + ?Sized> {
    directory: &'d D,
}

impl<'d, D: Directory + ?Sized> IdentityResolver<'d, D> {
    pub fn new(directory: &'d D) -> Self {
        Self { directory }
    }

    pub fn index_groups(&self) -> Result<GroupIndex, DirectoryError> {
        let groups = self.directory.list_groups()?;
        log::debug!("indexed {} remote groups", groups.len());
        Ok(GroupIndex::from_records(groups))
    }

    pub fn index_entities(
        &self,
        entity_types: &BTreeSet<String>,
        case_sensitive: bool,
    ) -> Result<EntityIndex, DirectoryError> {
        if entity_types.is_empty() {
            return Ok(EntityIndex::from_records(Vec::new(), case_sensitive));
        }
        let entities = self.directory.list_entities(entity_types)?;
        log::debug!(
            "indexed {} entities across {} type(s)",
            entities.len(),
            entity_types.len()
        );
        Ok(EntityIndex::from_records(
            entities.into_iter().filter(|e| entity_types.contains(&e.entity_type)),
            case_sensitive,
        ))
    }

    pub fn resolve_name(
        &self,
        name: &str,
        entity_type: &str,
        case_sensitive: bool,
    ) -> Result<String, ResolveError> {
        let matches = self
            .directory
            .find_entities_by_name(name, entity_type, case_sensitive)?;
        match matches.as_slice() {
            [] => Err(ResolveError::NameNotFound {
                name: name.to_string(),
                entity_type: entity_type.to_string(),
            }),
            [only] => Ok(only.identifier.clone()),
            many => Err(ResolveError::AmbiguousName {
                name: name.to_string(),
                entity_type: entity_type.to_string(),
                matches: many.len(),
            }),
        }
    }

    /// Resolve every name, failing on the first that does not resolve.
    pub fn resolve_names<'n>(
        &self,
        names: impl IntoIterator<Item = &'n String>,
        entity_type: &str,
        case_sensitive: bool,
    ) -> Result<Vec<String>, ResolveError> {
        names
            .into_iter()
            .map(|name| self.resolve_name(name, entity_type, case_sensitive))
            .collect()
    }

    pub fn resolve_group_identifier(&self, name: &str) -> Result<String, ResolveError> {
        let matches = self.directory.find_groups_by_name(name)?;
        single_group(name, &matches.iter().collect::<Vec<_>>())
    }

    /// Like [`Self::resolve_group_identifier`], ignoring groups of other
    /// entity types that share the name.
    pub fn resolve_typed_group_identifier(
        &self,
        name: &str,
        entity_type: &str,
    ) -> Result<String, ResolveError> {
        let matches = self.directory.find_groups_by_name(name)?;
        let typed: Vec<&GroupRecord> = matches.iter().filter(|g| g.entity_type == entity_type).collect();
        single_group(name, &typed)
    }
}

fn single_group(name: &str, matches: &[&GroupRecord]) -> Result<String, ResolveError> {
    match matches {
        [] => Err(ResolveError::GroupNotFound { name: name.to_string() }),
        [only] => Ok(only.identifier.clone()),
        many => Err(ResolveError::AmbiguousGroupName {
            name: name.to_string(),
            matches: many.len(),
        }),
    }
}
