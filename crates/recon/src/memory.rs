//! In-process [`Directory`] backed by plain collections.
//!
//! Every mutating call is recorded so callers can assert that a run was (or
//! was not) a no-op.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::directory::Directory;
use crate::error::DirectoryError;
use crate::model::{EntityRecord, GroupRecord, MemberRecord};

/// A mutating call observed by [`MemoryDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create { name: String, members: Vec<String> },
    Replace { identifier: String, members: Vec<String> },
    Delete { identifier: String },
}

#[derive(Debug, Clone)]
struct StoredGroup {
    record: GroupRecord,
    members: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    groups: RefCell<BTreeMap<String, StoredGroup>>,
    entities: RefCell<Vec<EntityRecord>>,
    mutations: RefCell<Vec<Mutation>>,
    failing_groups: RefCell<HashSet<String>>,
    next_id: Cell<u64>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self, prefix: &str) -> String {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        format!("{prefix}-{id}")
    }

    /// Register an entity and return its identifier.
    pub fn add_entity(&self, entity_type: &str, name: &str) -> String {
        self.add_entity_with_state(entity_type, name, Some("ACTIVE"))
    }

    pub fn add_entity_with_state(&self, entity_type: &str, name: &str, state: Option<&str>) -> String {
        let identifier = self.allocate_id("e");
        self.entities.borrow_mut().push(EntityRecord {
            identifier: identifier.clone(),
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            state: state.map(String::from),
        });
        identifier
    }

    /// Seed a static group without recording a mutation.
    pub fn seed_group(&self, name: &str, entity_type: &str, members: &[String]) -> String {
        let identifier = self.allocate_id("g");
        self.groups.borrow_mut().insert(
            identifier.clone(),
            StoredGroup {
                record: GroupRecord {
                    identifier: identifier.clone(),
                    name: name.to_string(),
                    entity_type: entity_type.to_string(),
                    is_static: true,
                },
                members: members.iter().cloned().collect(),
            },
        );
        identifier
    }

    /// Make every mutating call that targets `group_name` fail with HTTP 500.
    pub fn fail_mutations_for(&self, group_name: &str) {
        self.failing_groups.borrow_mut().insert(group_name.to_string());
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.borrow().clone()
    }

    pub fn clear_mutations(&self) {
        self.mutations.borrow_mut().clear();
    }

    /// Current member identifiers of the named group, if exactly one exists.
    pub fn members_of(&self, group_name: &str) -> Option<BTreeSet<String>> {
        let groups = self.groups.borrow();
        let mut found = groups.values().filter(|g| g.record.name == group_name);
        let first = found.next()?;
        if found.next().is_some() {
            return None;
        }
        Some(first.members.clone())
    }

    /// Like [`Self::members_of`] for the group holding `entity_type`.
    pub fn typed_members_of(&self, group_name: &str, entity_type: &str) -> Option<BTreeSet<String>> {
        self.groups
            .borrow()
            .values()
            .find(|g| g.record.name == group_name && g.record.entity_type == entity_type)
            .map(|g| g.members.clone())
    }

    pub fn group_count(&self) -> usize {
        self.groups.borrow().len()
    }

    fn check_failure(&self, group_name: &str) -> Result<(), DirectoryError> {
        if self.failing_groups.borrow().contains(group_name) {
            return Err(DirectoryError::Http(500, format!("simulated failure for '{group_name}'")));
        }
        Ok(())
    }

    fn validate_members(&self, entity_type: &str, members: &[String]) -> Result<(), DirectoryError> {
        let entities = self.entities.borrow();
        for id in members {
            let known = entities
                .iter()
                .any(|e| &e.identifier == id && e.entity_type == entity_type);
            if !known {
                return Err(DirectoryError::Validation(format!(
                    "{id} is not a known {entity_type}"
                )));
            }
        }
        Ok(())
    }
}

impl Directory for MemoryDirectory {
    fn list_groups(&self) -> Result<Vec<GroupRecord>, DirectoryError> {
        Ok(self.groups.borrow().values().map(|g| g.record.clone()).collect())
    }

    fn list_entities(&self, entity_types: &BTreeSet<String>) -> Result<Vec<EntityRecord>, DirectoryError> {
        Ok(self
            .entities
            .borrow()
            .iter()
            .filter(|e| entity_types.contains(&e.entity_type))
            .cloned()
            .collect())
    }

    fn get_group_members(&self, identifier: &str) -> Result<Vec<MemberRecord>, DirectoryError> {
        let groups = self.groups.borrow();
        let group = groups
            .get(identifier)
            .ok_or_else(|| DirectoryError::NotFound(format!("group {identifier}")))?;
        let entities = self.entities.borrow();
        Ok(group
            .members
            .iter()
            .map(|id| MemberRecord {
                identifier: id.clone(),
                name: entities
                    .iter()
                    .find(|e| &e.identifier == id)
                    .map(|e| e.name.clone())
                    .unwrap_or_default(),
            })
            .collect())
    }

    fn create_static_group(
        &self,
        name: &str,
        entity_type: &str,
        member_identifiers: &[String],
    ) -> Result<String, DirectoryError> {
        self.check_failure(name)?;
        self.validate_members(entity_type, member_identifiers)?;
        self.mutations.borrow_mut().push(Mutation::Create {
            name: name.to_string(),
            members: member_identifiers.to_vec(),
        });
        Ok(self.seed_group(name, entity_type, member_identifiers))
    }

    fn replace_static_group_members(
        &self,
        identifier: &str,
        name: &str,
        entity_type: &str,
        member_identifiers: &[String],
    ) -> Result<(), DirectoryError> {
        self.check_failure(name)?;
        self.validate_members(entity_type, member_identifiers)?;
        let mut groups = self.groups.borrow_mut();
        let group = groups
            .get_mut(identifier)
            .ok_or_else(|| DirectoryError::NotFound(format!("group {identifier}")))?;
        group.members = member_identifiers.iter().cloned().collect();
        self.mutations.borrow_mut().push(Mutation::Replace {
            identifier: identifier.to_string(),
            members: member_identifiers.to_vec(),
        });
        Ok(())
    }

    fn delete_group(&self, identifier: &str) -> Result<(), DirectoryError> {
        let name = self
            .groups
            .borrow()
            .get(identifier)
            .map(|g| g.record.name.clone())
            .ok_or_else(|| DirectoryError::NotFound(format!("group {identifier}")))?;
        self.check_failure(&name)?;
        self.groups.borrow_mut().remove(identifier);
        self.mutations.borrow_mut().push(Mutation::Delete {
            identifier: identifier.to_string(),
        });
        Ok(())
    }

    fn find_entities_by_name(
        &self,
        name: &str,
        entity_type: &str,
        case_sensitive: bool,
    ) -> Result<Vec<EntityRecord>, DirectoryError> {
        Ok(self
            .entities
            .borrow()
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .filter(|e| {
                if case_sensitive {
                    e.name == name
                } else {
                    e.name.to_lowercase() == name.to_lowercase()
                }
            })
            .cloned()
            .collect())
    }

    fn find_groups_by_name(&self, name: &str) -> Result<Vec<GroupRecord>, DirectoryError> {
        Ok(self
            .groups
            .borrow()
            .values()
            .filter(|g| g.record.name == name)
            .map(|g| g.record.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_records_mutation_and_group() {
        let dir = MemoryDirectory::new();
        let vm = dir.add_entity("VirtualMachine", "vm-1");
        let id = dir.create_static_group("NY", "VirtualMachine", &[vm.clone()]).unwrap();

        assert_eq!(dir.group_count(), 1);
        assert_eq!(dir.get_group_members(&id).unwrap()[0].name, "vm-1");
        assert_eq!(
            dir.mutations(),
            vec![Mutation::Create { name: "NY".into(), members: vec![vm] }]
        );
    }

    #[test]
    fn seeded_groups_are_not_mutations() {
        let dir = MemoryDirectory::new();
        dir.seed_group("NY", "VirtualMachine", &[]);
        assert!(dir.mutations().is_empty());
        assert_eq!(dir.find_groups_by_name("NY").unwrap().len(), 1);
    }

    #[test]
    fn unknown_member_rejected() {
        let dir = MemoryDirectory::new();
        let err = dir
            .create_static_group("NY", "VirtualMachine", &["e-99".to_string()])
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Validation(_)));
    }

    #[test]
    fn simulated_failure() {
        let dir = MemoryDirectory::new();
        dir.fail_mutations_for("NY");
        let err = dir.create_static_group("NY", "VirtualMachine", &[]).unwrap_err();
        assert_eq!(err, DirectoryError::Http(500, "simulated failure for 'NY'".into()));
        assert_eq!(dir.group_count(), 0);
    }

    #[test]
    fn case_insensitive_search() {
        let dir = MemoryDirectory::new();
        dir.add_entity("VirtualMachine", "Web-01");
        assert!(dir.find_entities_by_name("web-01", "VirtualMachine", true).unwrap().is_empty());
        assert_eq!(dir.find_entities_by_name("web-01", "VirtualMachine", false).unwrap().len(), 1);
    }
}
