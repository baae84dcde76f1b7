//! Dump existing directory groups back to the input CSV shape.
//!
//! One row per group member. The entity type column carries the group's
//! entity type, so the output can be fed straight back into a sync run.

use std::io;

use crate::directory::Directory;
use crate::error::{DirectoryError, SyncError};
use crate::model::GroupRecord;

pub const GROUP_NAME_COLUMN: &str = "Group Name";
pub const GROUP_TYPE_COLUMN: &str = "Group Type";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Include built-in groups, not just user-created ones.
    pub all_groups: bool,
    /// Add a `Group Type` column (`Static` / `Dynamic`).
    pub include_group_type: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub entity_type: String,
    pub entity_name: String,
    pub group_name: String,
    pub is_static: bool,
}

pub fn group_type_label(is_static: bool) -> &'static str {
    if is_static {
        "Static"
    } else {
        "Dynamic"
    }
}

/// Fetch every selected group and its members.
pub fn collect_export_rows<D: Directory + ?Sized>(
    directory: &D,
    options: ExportOptions,
) -> Result<Vec<ExportRow>, DirectoryError> {
    let groups: Vec<GroupRecord> = if options.all_groups {
        directory.list_groups()?
    } else {
        directory.list_custom_groups()?
    };
    log::info!("exporting {} group(s)", groups.len());

    let mut rows = Vec::new();
    for group in groups {
        let members = directory.get_group_members(&group.identifier)?;
        log::debug!("group '{}': {} member(s)", group.name, members.len());
        rows.extend(members.into_iter().map(|m| ExportRow {
            entity_type: group.entity_type.clone(),
            entity_name: m.name,
            group_name: group.name.clone(),
            is_static: group.is_static,
        }));
    }
    Ok(rows)
}

/// Write rows as CSV with the standard header.
pub fn write_export_csv<W: io::Write>(
    writer: W,
    rows: &[ExportRow],
    include_group_type: bool,
) -> Result<(), SyncError> {
    let mut out = csv::Writer::from_writer(writer);
    let csv_err = |e: csv::Error| SyncError::Csv(e.to_string());

    let mut header = vec![
        crate::config::DEFAULT_ENTITY_TYPE_COLUMN,
        crate::config::DEFAULT_ENTITY_NAME_COLUMN,
        GROUP_NAME_COLUMN,
    ];
    if include_group_type {
        header.push(GROUP_TYPE_COLUMN);
    }
    out.write_record(&header).map_err(csv_err)?;

    for row in rows {
        let mut record = vec![
            row.entity_type.as_str(),
            row.entity_name.as_str(),
            row.group_name.as_str(),
        ];
        if include_group_type {
            record.push(group_type_label(row.is_static));
        }
        out.write_record(&record).map_err(csv_err)?;
    }
    out.flush().map_err(|e| SyncError::Csv(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouper::{load_csv_rows, GroupingSpec};
    use crate::memory::MemoryDirectory;

    fn seeded() -> MemoryDirectory {
        let dir = MemoryDirectory::new();
        let a = dir.add_entity("VirtualMachine", "vm-a");
        let b = dir.add_entity("VirtualMachine", "vm-b");
        dir.seed_group("NY", "VirtualMachine", &[a, b.clone()]);
        dir.seed_group("LA", "VirtualMachine", &[b]);
        dir
    }

    #[test]
    fn rows_per_member() {
        let dir = seeded();
        let rows = collect_export_rows(&dir, ExportOptions::default()).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows
            .iter()
            .any(|r| r.group_name == "LA" && r.entity_name == "vm-b" && r.entity_type == "VirtualMachine"));
    }

    #[test]
    fn csv_with_and_without_group_type() {
        let rows = vec![ExportRow {
            entity_type: "VirtualMachine".into(),
            entity_name: "vm-a".into(),
            group_name: "NY".into(),
            is_static: true,
        }];

        let mut buf = Vec::new();
        write_export_csv(&mut buf, &rows, false).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Entity Type,Entity Name,Group Name\nVirtualMachine,vm-a,NY\n"
        );

        let mut buf = Vec::new();
        write_export_csv(&mut buf, &rows, true).unwrap();
        assert!(String::from_utf8(buf).unwrap().ends_with("NY,Static\n"));
    }

    #[test]
    fn export_feeds_back_into_grouping() {
        let dir = seeded();
        let rows = collect_export_rows(&dir, ExportOptions::default()).unwrap();
        let mut buf = Vec::new();
        write_export_csv(&mut buf, &rows, false).unwrap();

        let input = load_csv_rows(&String::from_utf8(buf).unwrap()).unwrap();
        let groups = GroupingSpec::new("Entity Type", "Entity Name")
            .group(&input)
            .unwrap();
        let mut names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["LA", "NY"]);
    }
}
