//! The remote directory seam.
//!
//! The engine only ever talks to the inventory service through this trait.
//! `groupsync-directory-client` implements it over HTTP; [`crate::memory`]
//! implements it in-process.

use std::collections::BTreeSet;

use crate::error::DirectoryError;
use crate::model::{EntityRecord, GroupRecord, MemberRecord};

pub trait Directory {
    /// Every group known to the directory.
    fn list_groups(&self) -> Result<Vec<GroupRecord>, DirectoryError>;

    /// User-created groups only. Used by export; defaults to all groups.
    fn list_custom_groups(&self) -> Result<Vec<GroupRecord>, DirectoryError> {
        self.list_groups()
    }

    /// Every entity whose type is in `entity_types`.
    fn list_entities(&self, entity_types: &BTreeSet<String>) -> Result<Vec<EntityRecord>, DirectoryError>;

    fn get_group_members(&self, identifier: &str) -> Result<Vec<MemberRecord>, DirectoryError>;

    /// Create a static group. Returns the new group's identifier.
    fn create_static_group(
        &self,
        name: &str,
        entity_type: &str,
        member_identifiers: &[String],
    ) -> Result<String, DirectoryError>;

    /// Overwrite a static group's member list.
    fn replace_static_group_members(
        &self,
        identifier: &str,
        name: &str,
        entity_type: &str,
        member_identifiers: &[String],
    ) -> Result<(), DirectoryError>;

    fn delete_group(&self, identifier: &str) -> Result<(), DirectoryError>;

    /// Exact-name entity search.
    fn find_entities_by_name(
        &self,
        name: &str,
        entity_type: &str,
        case_sensitive: bool,
    ) -> Result<Vec<EntityRecord>, DirectoryError>;

    /// Exact-name group search.
    fn find_groups_by_name(&self, name: &str) -> Result<Vec<GroupRecord>, DirectoryError>;
}
