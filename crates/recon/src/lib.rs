//! `groupsync-recon`: static group reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded rows and a [`Directory`], returns
//! categorized change events. No CLI or HTTP dependencies.

pub mod config;
pub mod diff;
pub mod directory;
pub mod engine;
pub mod error;
pub mod export;
pub mod group;
pub mod grouper;
pub mod memory;
pub mod model;
pub mod reconcile;
pub mod resolver;
pub mod tracker;

pub use config::SyncConfig;
pub use directory::Directory;
pub use engine::{preview, run};
pub use error::{DirectoryError, GroupError, ResolveError, SyncError};
pub use group::StaticGroup;
pub use grouper::{load_csv_rows, GroupingSpec};
pub use memory::MemoryDirectory;
pub use model::{CandidateGroup, RowSet, SyncReport};
pub use tracker::{ChangeCategory, ChangeSnapshot, ChangeTracker, ReportOptions};
