//! A handle on one remote static group.
//!
//! The handle caches the group's identifier for the rest of the run. Each
//! operation starts with an explicit guard: [`StaticGroup::require_identifier`]
//! for operations on an existing group, [`StaticGroup::require_absent`] before
//! a create, and a held identifier before a delete.

use std::collections::BTreeSet;

use crate::diff::{diff, MembershipDiff, MembershipPolicy};
use crate::directory::Directory;
use crate::error::{GroupError, ResolveError};
use crate::model::MemberRecord;
use crate::resolver::IdentityResolver;

/// How the handle interprets member strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRefs {
    /// Members are already directory identifiers.
    Identifiers,
    /// Members are display names, looked up one by one.
    Names { case_sensitive: bool },
}

/// What `add_or_update` ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    Created { members: usize },
    Updated(MembershipDiff),
    Unchanged,
}

pub struct StaticGroup<'d, D: Directory + ?Sized> {
    directory: &'d D,
    pub name: String,
    pub entity_type: String,
    /// Desired members, as names or identifiers per [`MemberRefs`].
    pub members: BTreeSet<String>,
    identifier: Option<String>,
}

impl<'d, D: Directory + ?Sized> StaticGroup<'d, D> {
    pub fn new(directory: &'d D, name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            directory,
            name: name.into(),
            entity_type: entity_type.into(),
            members: BTreeSet::new(),
            identifier: None,
        }
    }

    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members = members.into_iter().map(Into::into).collect();
        self
    }

    /// Seed an identifier already known from an index.
    pub fn with_identifier(mut self, identifier: Option<String>) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    // ── Guards ──────────────────────────────────────────────────────

    /// Return the cached identifier, looking it up by name if needed.
    pub fn require_identifier(&mut self) -> Result<String, GroupError> {
        if let Some(id) = &self.identifier {
            return Ok(id.clone());
        }
        let id = IdentityResolver::new(self.directory)
            .resolve_typed_group_identifier(&self.name, &self.entity_type)?;
        self.identifier = Some(id.clone());
        Ok(id)
    }

    /// Fail unless no group with this name and entity type exists.
    pub fn require_absent(&self) -> Result<(), GroupError> {
        if let Some(id) = &self.identifier {
            return Err(self.already_exists(id));
        }
        match IdentityResolver::new(self.directory)
            .resolve_typed_group_identifier(&self.name, &self.entity_type)
        {
            Ok(id) => Err(self.already_exists(&id)),
            Err(ResolveError::GroupNotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn already_exists(&self, identifier: &str) -> GroupError {
        GroupError::AlreadyExists {
            name: self.name.clone(),
            identifier: identifier.to_string(),
        }
    }

    /// Whether exactly one group with this name and entity type exists.
    /// Several such groups is an error, not "absent".
    pub fn exists(&mut self) -> Result<bool, GroupError> {
        match self.require_identifier() {
            Ok(_) => Ok(true),
            Err(GroupError::Resolve(ResolveError::GroupNotFound { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn current_members(&mut self) -> Result<Vec<MemberRecord>, GroupError> {
        let id = self.require_identifier()?;
        Ok(self.directory.get_group_members(&id)?)
    }

    fn current_member_ids(&mut self) -> Result<BTreeSet<String>, GroupError> {
        Ok(self
            .current_members()?
            .into_iter()
            .map(|m| m.identifier)
            .collect())
    }

    fn to_identifiers(
        &self,
        members: &BTreeSet<String>,
        refs: MemberRefs,
    ) -> Result<BTreeSet<String>, GroupError> {
        match refs {
            MemberRefs::Identifiers => Ok(members.clone()),
            MemberRefs::Names { case_sensitive } => Ok(IdentityResolver::new(self.directory)
                .resolve_names(members, &self.entity_type, case_sensitive)?
                .into_iter()
                .collect()),
        }
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Create the group with its desired members. Returns the member count.
    pub fn add(&mut self, refs: MemberRefs, dry_run: bool) -> Result<usize, GroupError> {
        self.require_absent()?;
        let ids: Vec<String> = self.to_identifiers(&self.members, refs)?.into_iter().collect();
        if !dry_run {
            let id = self
                .directory
                .create_static_group(&self.name, &self.entity_type, &ids)?;
            self.identifier = Some(id);
        }
        Ok(ids.len())
    }

    /// Move the group toward its desired members under `policy`. Returns the
    /// eligible diff; an empty diff means nothing was written.
    pub fn update(
        &mut self,
        policy: MembershipPolicy,
        refs: MemberRefs,
        dry_run: bool,
    ) -> Result<MembershipDiff, GroupError> {
        let id = self.require_identifier()?;
        let desired = self.to_identifiers(&self.members, refs)?;
        let current = self.current_member_ids()?;

        let eligible = policy.eligible(&diff(&current, &desired));
        if eligible.is_noop() {
            return Ok(eligible);
        }

        let next: Vec<String> = policy.next_members(&current, &desired).into_iter().collect();
        if !dry_run {
            self.directory
                .replace_static_group_members(&id, &self.name, &self.entity_type, &next)?;
        }
        Ok(eligible)
    }

    /// Add members on top of the current membership. Returns how many were new.
    pub fn add_entities(
        &mut self,
        members: &BTreeSet<String>,
        refs: MemberRefs,
        dry_run: bool,
    ) -> Result<usize, GroupError> {
        let policy = MembershipPolicy { allow_add: true, allow_remove: false };
        self.patch(members, refs, policy, dry_run).map(|d| d.add.len())
    }

    /// Remove the given members from the current membership. Returns how
    /// many were actually present.
    pub fn remove_entities(
        &mut self,
        members: &BTreeSet<String>,
        refs: MemberRefs,
        dry_run: bool,
    ) -> Result<usize, GroupError> {
        let id = self.require_identifier()?;
        let drop = self.to_identifiers(members, refs)?;
        let current = self.current_member_ids()?;

        let removed: BTreeSet<String> = current.intersection(&drop).cloned().collect();
        if removed.is_empty() {
            return Ok(0);
        }
        let next: Vec<String> = current.difference(&removed).cloned().collect();
        if !dry_run {
            self.directory
                .replace_static_group_members(&id, &self.name, &self.entity_type, &next)?;
        }
        Ok(removed.len())
    }

    fn patch(
        &mut self,
        members: &BTreeSet<String>,
        refs: MemberRefs,
        policy: MembershipPolicy,
        dry_run: bool,
    ) -> Result<MembershipDiff, GroupError> {
        let id = self.require_identifier()?;
        let wanted = self.to_identifiers(members, refs)?;
        let current = self.current_member_ids()?;

        let desired: BTreeSet<String> = current.union(&wanted).cloned().collect();
        let eligible = policy.eligible(&diff(&current, &desired));
        if eligible.is_noop() {
            return Ok(eligible);
        }
        let next: Vec<String> = policy.next_members(&current, &desired).into_iter().collect();
        if !dry_run {
            self.directory
                .replace_static_group_members(&id, &self.name, &self.entity_type, &next)?;
        }
        Ok(eligible)
    }

    /// Update the group if it exists, otherwise create it.
    pub fn add_or_update(
        &mut self,
        policy: MembershipPolicy,
        refs: MemberRefs,
        dry_run: bool,
    ) -> Result<GroupOutcome, GroupError> {
        if self.exists()? {
            let eligible = self.update(policy, refs, dry_run)?;
            if eligible.is_noop() {
                return Ok(GroupOutcome::Unchanged);
            }
            return Ok(GroupOutcome::Updated(eligible));
        }
        let members = self.add(refs, dry_run)?;
        Ok(GroupOutcome::Created { members })
    }

    /// Delete the group. Requires a held identifier; on a live delete the
    /// identifier is cleared so the handle reports the group as gone.
    pub fn remove(&mut self, dry_run: bool) -> Result<(), GroupError> {
        let id = self
            .identifier
            .clone()
            .ok_or_else(|| GroupError::MissingIdentifier { name: self.name.clone() })?;
        if !dry_run {
            self.directory.delete_group(&id)?;
            self.identifier = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDirectory, Mutation};

    const VM: &str = "VirtualMachine";
    const BY_NAME: MemberRefs = MemberRefs::Names { case_sensitive: true };

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn add_then_exists() {
        let dir = MemoryDirectory::new();
        dir.add_entity(VM, "vm1");
        dir.add_entity(VM, "vm2");

        let mut group = StaticGroup::new(&dir, "Sample_Group", VM).with_members(["vm1", "vm2"]);
        assert!(!group.exists().unwrap());
        assert_eq!(group.add(BY_NAME, false).unwrap(), 2);
        assert!(group.identifier().is_some());

        let mut again = StaticGroup::new(&dir, "Sample_Group", VM);
        assert!(again.exists().unwrap());
        assert!(matches!(again.add(BY_NAME, false), Err(GroupError::AlreadyExists { .. })));
    }

    #[test]
    fn add_fails_when_member_name_unknown() {
        let dir = MemoryDirectory::new();
        let mut group = StaticGroup::new(&dir, "G", VM).with_members(["ghost"]);
        let err = group.add(BY_NAME, false).unwrap_err();
        assert!(matches!(err, GroupError::Resolve(ResolveError::NameNotFound { .. })));
        assert_eq!(dir.group_count(), 0);
    }

    #[test]
    fn incremental_add_and_remove() {
        let dir = MemoryDirectory::new();
        let vm1 = dir.add_entity(VM, "SampleVM1");
        let vm2 = dir.add_entity(VM, "SampleVM2");
        dir.seed_group("Sample_Group", VM, &[]);

        let mut group = StaticGroup::new(&dir, "Sample_Group", VM);
        let refs = MemberRefs::Names { case_sensitive: false };
        assert_eq!(group.add_entities(&names(&["samplevm1", "SampleVM2"]), refs, false).unwrap(), 2);
        assert_eq!(dir.members_of("Sample_Group").unwrap(), BTreeSet::from([vm1.clone(), vm2.clone()]));

        assert_eq!(group.add_entities(&names(&["SampleVM1"]), refs, false).unwrap(), 0);
        assert_eq!(group.remove_entities(&names(&["SampleVM2"]), refs, false).unwrap(), 1);
        assert_eq!(dir.members_of("Sample_Group").unwrap(), BTreeSet::from([vm1]));
        assert_eq!(group.remove_entities(&names(&["SampleVM2"]), refs, false).unwrap(), 0);

        // one write for the add, one for the remove
        assert_eq!(dir.mutations().len(), 2);
    }

    #[test]
    fn update_overwrites_members() {
        let dir = MemoryDirectory::new();
        let vm1 = dir.add_entity(VM, "vm1");
        let vm2 = dir.add_entity(VM, "vm2");
        dir.seed_group("G", VM, &[vm1.clone(), vm2]);

        let mut group = StaticGroup::new(&dir, "G", VM).with_members(["vm1"]);
        let eligible = group.update(MembershipPolicy::default(), BY_NAME, false).unwrap();
        assert_eq!(eligible.remove.len(), 1);
        assert_eq!(dir.members_of("G").unwrap(), BTreeSet::from([vm1]));

        let eligible = group.update(MembershipPolicy::default(), BY_NAME, false).unwrap();
        assert!(eligible.is_noop());
        assert_eq!(dir.mutations().len(), 1);
    }

    #[test]
    fn dry_run_never_writes() {
        let dir = MemoryDirectory::new();
        dir.add_entity(VM, "vm1");
        let mut group = StaticGroup::new(&dir, "G", VM).with_members(["vm1"]);
        assert_eq!(
            group.add_or_update(MembershipPolicy::default(), BY_NAME, true).unwrap(),
            GroupOutcome::Created { members: 1 }
        );
        assert!(group.identifier().is_none());
        assert!(dir.mutations().is_empty());
    }

    #[test]
    fn add_or_update_existing() {
        let dir = MemoryDirectory::new();
        let vm1 = dir.add_entity(VM, "vm1");
        dir.seed_group("G", VM, &[]);
        let mut group = StaticGroup::new(&dir, "G", VM).with_members(["vm1"]);

        match group.add_or_update(MembershipPolicy::default(), BY_NAME, false).unwrap() {
            GroupOutcome::Updated(d) => assert_eq!(d.add, BTreeSet::from([vm1])),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            group.add_or_update(MembershipPolicy::default(), BY_NAME, false).unwrap(),
            GroupOutcome::Unchanged
        );
    }

    #[test]
    fn remove_requires_identifier_and_clears_it() {
        let dir = MemoryDirectory::new();
        let id = dir.seed_group("G", VM, &[]);

        let mut group = StaticGroup::new(&dir, "G", VM).with_identifier(Some(id.clone()));
        group.remove(false).unwrap();
        assert!(group.identifier().is_none());
        assert_eq!(dir.mutations(), vec![Mutation::Delete { identifier: id }]);

        let err = group.remove(false).unwrap_err();
        assert_eq!(err, GroupError::MissingIdentifier { name: "G".into() });
        assert_eq!(dir.mutations().len(), 1);
        assert!(!group.exists().unwrap());
    }

    #[test]
    fn duplicate_names_are_an_error() {
        let dir = MemoryDirectory::new();
        dir.seed_group("G", VM, &[]);
        dir.seed_group("G", VM, &[]);
        let mut group = StaticGroup::new(&dir, "G", VM);
        assert!(matches!(
            group.exists(),
            Err(GroupError::Resolve(ResolveError::AmbiguousGroupName { matches: 2, .. }))
        ));
        assert!(group.require_absent().is_err());
    }
}
