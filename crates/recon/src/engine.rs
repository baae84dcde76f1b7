use std::collections::BTreeSet;

use crate::config::SyncConfig;
use crate::directory::Directory;
use crate::error::SyncError;
use crate::grouper::complement_groups;
use crate::model::{CandidateGroup, RowSet, SyncMeta, SyncReport};
use crate::reconcile::GroupReconciler;
use crate::resolver::{EntityIndex, IdentityResolver};
use crate::tracker::ChangeTracker;

/// Group rows without touching the directory. Fails on schema errors.
pub fn preview(rows: &RowSet, config: &SyncConfig) -> Result<Vec<CandidateGroup>, SyncError> {
    config.validate()?;
    config.grouping_spec().group(rows)
}

/// Reconcile every group derived from `rows` against `directory`.
///
/// Schema errors and index-building failures abort before any group is
/// touched. Everything after that is recorded in `tracker`; the returned
/// report carries its snapshot.
pub fn run<D: Directory + ?Sized>(
    directory: &D,
    rows: &RowSet,
    config: &SyncConfig,
    tracker: &mut ChangeTracker,
) -> Result<SyncReport, SyncError> {
    let mut groups = preview(rows, config)?;
    log::info!(
        "derived {} candidate group(s) from {} row(s)",
        groups.len(),
        rows.len()
    );

    let resolver = IdentityResolver::new(directory);
    let group_index = resolver.index_groups()?;

    let entity_index = if config.delete {
        EntityIndex::default()
    } else {
        let types: BTreeSet<String> = groups.iter().map(|g| g.entity_type.clone()).collect();
        resolver.index_entities(&types, config.case_sensitive)?
    };

    if config.complement {
        complement_groups(&mut groups, &entity_index);
    }

    let mut reconciler = GroupReconciler::new(
        directory,
        config.reconcile_options(),
        &group_index,
        &entity_index,
        tracker,
    );
    for group in &groups {
        reconciler.reconcile(group);
    }

    Ok(SyncReport {
        meta: SyncMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            dry_run: config.dry_run,
            delete_mode: config.delete,
            groups: groups.len(),
        },
        changes: tracker.snapshot(),
    })
}
