//! Categorized change events for one run.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ChangeCategory {
    Added,
    Updated,
    Skipped,
    Deleted,
    #[serde(rename = "Missing Entities")]
    MissingEntity,
    #[serde(rename = "Errors")]
    Error,
}

impl ChangeCategory {
    pub const ALL: [ChangeCategory; 6] = [
        Self::Added,
        Self::Updated,
        Self::Skipped,
        Self::Deleted,
        Self::MissingEntity,
        Self::Error,
    ];

    pub fn level(&self) -> log::Level {
        match self {
            Self::Error => log::Level::Error,
            Self::MissingEntity => log::Level::Warn,
            _ => log::Level::Info,
        }
    }
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "Added"),
            Self::Updated => write!(f, "Updated"),
            Self::Skipped => write!(f, "Skipped"),
            Self::Deleted => write!(f, "Deleted"),
            Self::MissingEntity => write!(f, "Missing Entities"),
            Self::Error => write!(f, "Errors"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub category: ChangeCategory,
    pub subject_name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventEntry {
    #[serde(rename = "group name")]
    pub group_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryLog {
    pub total: usize,
    pub events: Vec<EventEntry>,
}

/// Point-in-time copy of everything tracked so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangeSnapshot {
    pub categories: BTreeMap<ChangeCategory, CategoryLog>,
}

impl ChangeSnapshot {
    pub fn total(&self, category: ChangeCategory) -> usize {
        self.categories.get(&category).map(|c| c.total).unwrap_or(0)
    }

    pub fn events(&self, category: ChangeCategory) -> &[EventEntry] {
        self.categories
            .get(&category)
            .map(|c| c.events.as_slice())
            .unwrap_or(&[])
    }

    /// Sum of every category total except those in `ignore`.
    pub fn total_changes(&self, ignore: &[ChangeCategory]) -> usize {
        self.categories
            .iter()
            .filter(|(category, _)| !ignore.contains(*category))
            .map(|(_, log)| log.total)
            .sum()
    }

    pub fn has_errors(&self) -> bool {
        self.total(ChangeCategory::Error) > 0
    }

    /// The end-of-run summary block.
    pub fn summary_text(&self, dry_run: bool, ignore: &[ChangeCategory]) -> String {
        let bar = "=".repeat(15);
        let mut lines = vec![String::new(), bar.clone(), "    Summary    ".to_string(), bar.clone()];
        if dry_run {
            lines.push("-dryrun enabled".to_string());
        }
        for (category, log) in &self.categories {
            lines.push(format!("{category}: {}", log.total));
        }
        lines.push(format!("Total Changes: {}", self.total_changes(ignore)));
        lines.push(bar);
        lines.join("\n")
    }
}

/// Which tracked events reach the observer. Errors always do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub quiet: bool,
    pub warnings: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self { quiet: true, warnings: true }
    }
}

impl ReportOptions {
    pub fn forwards(&self, category: ChangeCategory) -> bool {
        match category.level() {
            log::Level::Error => true,
            _ if self.quiet => false,
            log::Level::Warn => self.warnings,
            _ => true,
        }
    }
}

type Observer = Box<dyn FnMut(&ChangeEvent)>;

/// Append-only event log. Every event is also written to the `log` facade.
pub struct ChangeTracker {
    options: ReportOptions,
    changes: BTreeMap<ChangeCategory, CategoryLog>,
    observer: Option<Observer>,
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new(ReportOptions::default())
    }
}

impl ChangeTracker {
    pub fn new(options: ReportOptions) -> Self {
        Self { options, changes: BTreeMap::new(), observer: None }
    }

    /// Receive each forwarded event as it is tracked.
    pub fn with_observer(mut self, observer: impl FnMut(&ChangeEvent) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn options(&self) -> ReportOptions {
        self.options
    }

    pub fn track(&mut self, category: ChangeCategory, subject: impl Into<String>, message: impl Into<String>) {
        let event = ChangeEvent {
            category,
            subject_name: subject.into(),
            message: message.into(),
        };
        log::log!(target: "groupsync::changes", category.level(), "{}", event.message);

        let entry = self.changes.entry(category).or_default();
        entry.total += 1;
        entry.events.push(EventEntry {
            group_name: event.subject_name.clone(),
            message: event.message.clone(),
        });

        if self.options.forwards(category) {
            if let Some(observer) = self.observer.as_mut() {
                observer(&event);
            }
        }
    }

    pub fn snapshot(&self) -> ChangeSnapshot {
        ChangeSnapshot { categories: self.changes.clone() }
    }
}

impl fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("options", &self.options)
            .field("changes", &self.changes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn totals_and_order() {
        let mut tracker = ChangeTracker::default();
        tracker.track(ChangeCategory::Added, "NY", "Added NY (2 VMs)");
        tracker.track(ChangeCategory::MissingEntity, "NY", "Could not find VM x");
        tracker.track(ChangeCategory::Added, "LA", "Added LA (1 VMs)");

        let snap = tracker.snapshot();
        assert_eq!(snap.total(ChangeCategory::Added), 2);
        assert_eq!(snap.events(ChangeCategory::Added)[1].group_name, "LA");
        assert_eq!(snap.total(ChangeCategory::Deleted), 0);
        assert_eq!(snap.total_changes(&[]), 3);
        assert_eq!(snap.total_changes(&[ChangeCategory::MissingEntity]), 2);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let mut tracker = ChangeTracker::default();
        tracker.track(ChangeCategory::Skipped, "NY", "NY is already up to date");
        let before = tracker.snapshot();
        tracker.track(ChangeCategory::Skipped, "LA", "LA is already up to date");
        assert_eq!(before.total(ChangeCategory::Skipped), 1);
        assert_eq!(tracker.snapshot().total(ChangeCategory::Skipped), 2);
    }

    #[test]
    fn json_shape() {
        let mut tracker = ChangeTracker::default();
        tracker.track(ChangeCategory::Error, "NY", "boom");
        let json = serde_json::to_value(tracker.snapshot()).unwrap();
        assert_eq!(json["Errors"]["total"], 1);
        assert_eq!(json["Errors"]["events"][0]["group name"], "NY");
        assert_eq!(json["Errors"]["events"][0]["message"], "boom");
    }

    #[test]
    fn observer_respects_options() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut tracker = ChangeTracker::new(ReportOptions { quiet: false, warnings: false })
            .with_observer(move |e| sink.borrow_mut().push(e.category));

        tracker.track(ChangeCategory::Added, "NY", "added");
        tracker.track(ChangeCategory::MissingEntity, "NY", "missing");
        tracker.track(ChangeCategory::Error, "NY", "error");
        assert_eq!(*seen.borrow(), vec![ChangeCategory::Added, ChangeCategory::Error]);
        assert_eq!(tracker.snapshot().total(ChangeCategory::MissingEntity), 1);
    }

    #[test]
    fn quiet_still_forwards_errors() {
        let options = ReportOptions { quiet: true, warnings: true };
        assert!(options.forwards(ChangeCategory::Error));
        assert!(!options.forwards(ChangeCategory::Added));
        assert!(!options.forwards(ChangeCategory::MissingEntity));
    }

    #[test]
    fn summary_text_lists_categories() {
        let mut tracker = ChangeTracker::default();
        tracker.track(ChangeCategory::Added, "NY", "a");
        tracker.track(ChangeCategory::MissingEntity, "NY", "m");
        let text = tracker.snapshot().summary_text(true, &[ChangeCategory::MissingEntity]);
        assert!(text.contains("-dryrun enabled"));
        assert!(text.contains("Added: 1"));
        assert!(text.contains("Missing Entities: 1"));
        assert!(text.contains("Total Changes: 1"));
    }
}
