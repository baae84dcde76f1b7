use std::collections::BTreeSet;

/// Identifiers to add and remove to turn `current` into `desired`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub add: BTreeSet<String>,
    pub remove: BTreeSet<String>,
}

/// Pure set difference: `add = desired - current`, `remove = current - desired`.
pub fn diff(current: &BTreeSet<String>, desired: &BTreeSet<String>) -> MembershipDiff {
    MembershipDiff {
        add: desired.difference(current).cloned().collect(),
        remove: current.difference(desired).cloned().collect(),
    }
}

/// Which halves of a diff a run is allowed to apply. Add-only and
/// remove-only filter the same diff; neither overrides the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipPolicy {
    pub allow_add: bool,
    pub allow_remove: bool,
}

impl Default for MembershipPolicy {
    fn default() -> Self {
        Self { allow_add: true, allow_remove: true }
    }
}

impl MembershipPolicy {
    /// Drop the suppressed halves of `diff`.
    pub fn eligible(&self, diff: &MembershipDiff) -> MembershipDiff {
        MembershipDiff {
            add: if self.allow_add { diff.add.clone() } else { BTreeSet::new() },
            remove: if self.allow_remove { diff.remove.clone() } else { BTreeSet::new() },
        }
    }

    /// The full member set to write after applying the eligible changes.
    /// With both halves allowed this is exactly `desired`.
    pub fn next_members(
        &self,
        current: &BTreeSet<String>,
        desired: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        if self.allow_add && self.allow_remove {
            return desired.clone();
        }
        self.apply(current, &diff(current, desired))
    }

    /// `current ∪ add − remove`, each half only if allowed.
    pub fn apply(&self, current: &BTreeSet<String>, diff: &MembershipDiff) -> BTreeSet<String> {
        let eligible = self.eligible(diff);
        current
            .union(&eligible.add)
            .filter(|id| !eligible.remove.contains(*id))
            .cloned()
            .collect()
    }

    /// Human summary of the eligible counts, e.g. `1 removed 2 added`.
    pub fn describe(&self, eligible: &MembershipDiff) -> String {
        let mut parts = Vec::new();
        if self.allow_remove {
            parts.push(format!("{} removed", eligible.remove.len()));
        }
        if self.allow_add {
            parts.push(format!("{} added", eligible.add.len()));
        }
        parts.join(" ")
    }
}

impl MembershipDiff {
    pub fn is_noop(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    pub fn len(&self) -> usize {
        self.add.len() + self.remove.len()
    }
}
