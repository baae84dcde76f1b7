//! Per-group reconciliation.
//!
//! Each candidate group walks a small state machine:
//!
//! ```text
//! Unresolved ──► Create ──────────► Terminal
//!            ├─► Update{id} ──────► Terminal
//!            ├─► Delete{id?} ─────► Terminal
//!            └─► (lookup error) ──► Terminal
//! ```
//!
//! Every terminal transition records exactly one group-level event. Failures
//! are scoped to the group; the next group always runs.

use std::collections::BTreeSet;

use crate::diff::MembershipPolicy;
use crate::directory::Directory;
use crate::error::{GroupError, ResolveError};
use crate::group::{MemberRefs, StaticGroup};
use crate::model::CandidateGroup;
use crate::resolver::{EntityIndex, EntityMatch, GroupIndex};
use crate::tracker::{ChangeCategory, ChangeTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileOptions {
    pub policy: MembershipPolicy,
    /// Delete every candidate group instead of creating / updating.
    pub delete_mode: bool,
    pub dry_run: bool,
    /// When a name matches several entities, prefer the single active one.
    pub active_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupState {
    Unresolved,
    Create,
    Update { identifier: String },
    Delete { identifier: Option<String> },
    Terminal,
}

pub struct GroupReconciler<'a, D: Directory + ?Sized> {
    directory: &'a D,
    options: ReconcileOptions,
    groups: &'a GroupIndex,
    entities: &'a EntityIndex,
    tracker: &'a mut ChangeTracker,
}

impl<'a, D: Directory + ?Sized> GroupReconciler<'a, D> {
    pub fn new(
        directory: &'a D,
        options: ReconcileOptions,
        groups: &'a GroupIndex,
        entities: &'a EntityIndex,
        tracker: &'a mut ChangeTracker,
    ) -> Self {
        Self { directory, options, groups, entities, tracker }
    }

    /// Classify a group against the remote index.
    pub fn entry_state(&self, group: &CandidateGroup) -> Result<GroupState, ResolveError> {
        let matches = self.groups.get_typed(&group.name, &group.entity_type);
        let identifier = match matches.as_slice() {
            [] => None,
            [only] => Some(only.identifier.clone()),
            many => {
                return Err(ResolveError::AmbiguousGroupName {
                    name: group.name.clone(),
                    matches: many.len(),
                })
            }
        };
        Ok(match (self.options.delete_mode, identifier) {
            (true, identifier) => GroupState::Delete { identifier },
            (false, None) => GroupState::Create,
            (false, Some(identifier)) => GroupState::Update { identifier },
        })
    }

    /// Drive one group to [`GroupState::Terminal`].
    pub fn reconcile(&mut self, group: &CandidateGroup) {
        let mut state = GroupState::Unresolved;
        loop {
            log::trace!("group '{}': {:?}", group.name, state);
            state = match state {
                GroupState::Unresolved => match self.entry_state(group) {
                    Ok(next) => next,
                    Err(e) => {
                        self.record_failure(group, &GroupError::from(e));
                        GroupState::Terminal
                    }
                },
                GroupState::Create => {
                    self.create(group);
                    GroupState::Terminal
                }
                GroupState::Update { identifier } => {
                    self.update(group, identifier);
                    GroupState::Terminal
                }
                GroupState::Delete { identifier } => {
                    self.delete(group, identifier);
                    GroupState::Terminal
                }
                GroupState::Terminal => break,
            };
        }
    }

    /// Map member names to identifiers through the entity index. Names that
    /// do not resolve to exactly one entity are reported and left out.
    fn resolve_members(&mut self, group: &CandidateGroup) -> BTreeSet<String> {
        let mut resolved = BTreeSet::new();
        for name in &group.members {
            let message = match self.entities.lookup(&group.entity_type, name, self.options.active_only) {
                EntityMatch::Found(id) => {
                    resolved.insert(id);
                    continue;
                }
                EntityMatch::Missing(a) => format!("Could not find {} {}", a.entity_type, a.name),
                EntityMatch::Ambiguous(a) => {
                    format!("More than one instance of {} {} found", a.entity_type, a.name)
                }
                EntityMatch::AmbiguousActive(a) => {
                    format!("More than one Active instance of {} {} found", a.entity_type, a.name)
                }
            };
            self.tracker.track(ChangeCategory::MissingEntity, &group.name, message);
        }
        resolved
    }

    fn handle(&self, group: &CandidateGroup, members: BTreeSet<String>) -> StaticGroup<'a, D> {
        let mut handle = StaticGroup::new(self.directory, &group.name, &group.entity_type);
        handle.members = members;
        handle
    }

    fn create(&mut self, group: &CandidateGroup) {
        let members = self.resolve_members(group);
        let mut handle = self.handle(group, members);
        match handle.add(MemberRefs::Identifiers, self.options.dry_run) {
            Ok(count) => self.tracker.track(
                ChangeCategory::Added,
                &group.name,
                format!("Added {} ({} {}s)", group.name, count, group.entity_type),
            ),
            Err(e) => self.record_failure(group, &e),
        }
    }

    fn update(&mut self, group: &CandidateGroup, identifier: String) {
        let members = self.resolve_members(group);
        let mut handle = self.handle(group, members).with_identifier(Some(identifier));
        match handle.update(self.options.policy, MemberRefs::Identifiers, self.options.dry_run) {
            Ok(eligible) if eligible.is_noop() => self.tracker.track(
                ChangeCategory::Skipped,
                &group.name,
                format!("{} is already up to date", group.name),
            ),
            Ok(eligible) => self.tracker.track(
                ChangeCategory::Updated,
                &group.name,
                format!("{} Updated ({})", group.name, self.options.policy.describe(&eligible)),
            ),
            Err(e) => self.record_failure(group, &e),
        }
    }

    fn delete(&mut self, group: &CandidateGroup, identifier: Option<String>) {
        let mut handle = self.handle(group, BTreeSet::new()).with_identifier(identifier);
        match handle.remove(self.options.dry_run) {
            Ok(()) => self.tracker.track(
                ChangeCategory::Deleted,
                &group.name,
                format!("Deleted {}", group.name),
            ),
            Err(e) => self.record_failure(group, &e),
        }
    }

    fn record_failure(&mut self, group: &CandidateGroup, error: &GroupError) {
        let message = if self.options.delete_mode {
            format!("Could not delete group. {error}")
        } else {
            format!("Could not add or update '{}'. {error}", group.name)
        };
        self.tracker.track(ChangeCategory::Error, &group.name, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDirectory, Mutation};
    use crate::resolver::IdentityResolver;

    const VM: &str = "VirtualMachine";

    fn candidate(name: &str, members: &[&str]) -> CandidateGroup {
        CandidateGroup {
            name: name.into(),
            entity_type: VM.into(),
            members: members.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn run_one(dir: &MemoryDirectory, options: ReconcileOptions, group: &CandidateGroup) -> ChangeTracker {
        let resolver = IdentityResolver::new(dir);
        let groups = resolver.index_groups().unwrap();
        let entities = resolver
            .index_entities(&BTreeSet::from([VM.to_string()]), true)
            .unwrap();
        let mut tracker = ChangeTracker::default();
        GroupReconciler::new(dir, options, &groups, &entities, &mut tracker).reconcile(group);
        tracker
    }

    fn messages(tracker: &ChangeTracker, category: ChangeCategory) -> Vec<String> {
        tracker
            .snapshot()
            .events(category)
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    #[test]
    fn creates_missing_group() {
        let dir = MemoryDirectory::new();
        dir.add_entity(VM, "vm1");
        dir.add_entity(VM, "vm2");
        let tracker = run_one(&dir, ReconcileOptions::default(), &candidate("NY", &["vm1", "vm2"]));
        assert_eq!(messages(&tracker, ChangeCategory::Added), vec!["Added NY (2 VirtualMachines)"]);
        assert_eq!(dir.members_of("NY").unwrap().len(), 2);
    }

    #[test]
    fn missing_member_still_creates_group() {
        let dir = MemoryDirectory::new();
        dir.add_entity(VM, "vm1");
        let tracker = run_one(&dir, ReconcileOptions::default(), &candidate("NY", &["vm1", "ghost"]));
        assert_eq!(
            messages(&tracker, ChangeCategory::MissingEntity),
            vec!["Could not find VirtualMachine ghost"]
        );
        assert_eq!(messages(&tracker, ChangeCategory::Added), vec!["Added NY (1 VirtualMachines)"]);
    }

    #[test]
    fn ambiguous_member_is_reported() {
        let dir = MemoryDirectory::new();
        dir.add_entity(VM, "dup");
        dir.add_entity_with_state(VM, "dup", Some("INACTIVE"));
        let tracker = run_one(&dir, ReconcileOptions::default(), &candidate("NY", &["dup"]));
        assert_eq!(
            messages(&tracker, ChangeCategory::MissingEntity),
            vec!["More than one instance of VirtualMachine dup found"]
        );

        let options = ReconcileOptions { active_only: true, ..Default::default() };
        let dir2 = MemoryDirectory::new();
        let active = dir2.add_entity(VM, "dup");
        dir2.add_entity_with_state(VM, "dup", Some("INACTIVE"));
        let tracker = run_one(&dir2, options, &candidate("NY", &["dup"]));
        assert!(messages(&tracker, ChangeCategory::MissingEntity).is_empty());
        assert_eq!(dir2.members_of("NY").unwrap(), BTreeSet::from([active]));
    }

    #[test]
    fn up_to_date_group_is_skipped_without_writes() {
        let dir = MemoryDirectory::new();
        let vm1 = dir.add_entity(VM, "vm1");
        dir.seed_group("NY", VM, &[vm1]);
        let tracker = run_one(&dir, ReconcileOptions::default(), &candidate("NY", &["vm1"]));
        assert_eq!(messages(&tracker, ChangeCategory::Skipped), vec!["NY is already up to date"]);
        assert!(dir.mutations().is_empty());
    }

    #[test]
    fn update_message_lists_permitted_parts() {
        let dir = MemoryDirectory::new();
        let vm1 = dir.add_entity(VM, "vm1");
        dir.add_entity(VM, "vm2");
        dir.add_entity(VM, "vm3");
        dir.seed_group("NY", VM, &[vm1]);

        let tracker = run_one(&dir, ReconcileOptions::default(), &candidate("NY", &["vm2", "vm3"]));
        assert_eq!(
            messages(&tracker, ChangeCategory::Updated),
            vec!["NY Updated (1 removed 2 added)"]
        );

        let dir = MemoryDirectory::new();
        let vm1 = dir.add_entity(VM, "vm1");
        dir.add_entity(VM, "vm2");
        dir.seed_group("NY", VM, &[vm1.clone()]);
        let options = ReconcileOptions {
            policy: MembershipPolicy { allow_add: true, allow_remove: false },
            ..Default::default()
        };
        let tracker = run_one(&dir, options, &candidate("NY", &["vm2"]));
        assert_eq!(messages(&tracker, ChangeCategory::Updated), vec!["NY Updated (1 added)"]);
        assert!(dir.members_of("NY").unwrap().contains(&vm1));
    }

    #[test]
    fn suppressed_only_changes_count_as_skipped() {
        let dir = MemoryDirectory::new();
        let vm1 = dir.add_entity(VM, "vm1");
        dir.seed_group("NY", VM, &[vm1]);
        let options = ReconcileOptions {
            policy: MembershipPolicy { allow_add: true, allow_remove: false },
            ..Default::default()
        };
        let tracker = run_one(&dir, options, &candidate("NY", &[]));
        assert_eq!(messages(&tracker, ChangeCategory::Skipped).len(), 1);
        assert!(dir.mutations().is_empty());
    }

    #[test]
    fn duplicate_remote_groups_are_an_error() {
        let dir = MemoryDirectory::new();
        dir.seed_group("NY", VM, &[]);
        dir.seed_group("NY", VM, &[]);
        let tracker = run_one(&dir, ReconcileOptions::default(), &candidate("NY", &[]));
        assert_eq!(
            messages(&tracker, ChangeCategory::Error),
            vec!["Could not add or update 'NY'. found multiple groups matching name NY (2 matches)"]
        );
        assert!(dir.mutations().is_empty());
    }

    #[test]
    fn group_created_after_indexing_is_not_duplicated() {
        let dir = MemoryDirectory::new();
        dir.add_entity(VM, "vm1");
        let resolver = IdentityResolver::new(&dir);
        let groups = resolver.index_groups().unwrap();
        let entities = resolver
            .index_entities(&BTreeSet::from([VM.to_string()]), true)
            .unwrap();

        // Someone else creates the group between indexing and reconciling.
        let id = dir.seed_group("NY", VM, &[]);

        let mut tracker = ChangeTracker::default();
        GroupReconciler::new(&dir, ReconcileOptions::default(), &groups, &entities, &mut tracker)
            .reconcile(&candidate("NY", &["vm1"]));

        let errors = messages(&tracker, ChangeCategory::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("already exists"), "{}", errors[0]);
        assert!(errors[0].contains(&id), "{}", errors[0]);
        assert!(messages(&tracker, ChangeCategory::Added).is_empty());
        assert!(!dir.mutations().iter().any(|m| matches!(m, Mutation::Create { .. })));
        assert_eq!(dir.group_count(), 1);
        assert!(dir.members_of("NY").unwrap().is_empty());
    }

    #[test]
    fn delete_mode() {
        let dir = MemoryDirectory::new();
        let id = dir.seed_group("NY", VM, &[]);
        let options = ReconcileOptions { delete_mode: true, ..Default::default() };

        let tracker = run_one(&dir, options, &candidate("NY", &[]));
        assert_eq!(messages(&tracker, ChangeCategory::Deleted), vec!["Deleted NY"]);
        assert_eq!(dir.mutations(), vec![Mutation::Delete { identifier: id }]);

        let tracker = run_one(&dir, options, &candidate("NY", &[]));
        assert_eq!(
            messages(&tracker, ChangeCategory::Error),
            vec!["Could not delete group. group 'NY' has no resolved uuid"]
        );
    }

    #[test]
    fn directory_failure_is_scoped_to_group() {
        let dir = MemoryDirectory::new();
        dir.add_entity(VM, "vm1");
        dir.fail_mutations_for("Bad");
        let resolver = IdentityResolver::new(&dir);
        let groups = resolver.index_groups().unwrap();
        let entities = resolver
            .index_entities(&BTreeSet::from([VM.to_string()]), true)
            .unwrap();
        let mut tracker = ChangeTracker::default();
        let mut reconciler =
            GroupReconciler::new(&dir, ReconcileOptions::default(), &groups, &entities, &mut tracker);
        reconciler.reconcile(&candidate("Bad", &["vm1"]));
        reconciler.reconcile(&candidate("Good", &["vm1"]));

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.total(ChangeCategory::Error), 1);
        assert_eq!(snapshot.total(ChangeCategory::Added), 1);
        assert!(snapshot.events(ChangeCategory::Error)[0]
            .message
            .contains("simulated failure for 'Bad'"));
    }
}
