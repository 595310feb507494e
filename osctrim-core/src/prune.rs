//! Apply a [`Classification`] to a [`ChangeDocument`] in place.

use std::fmt;

use crate::{ChangeDocument, Classification, ElementKind};

/// Element counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCounts {
    /// Number of nodes.
    pub nodes: usize,
    /// Number of ways.
    pub ways: usize,
    /// Number of relations.
    pub relations: usize,
}

impl KindCounts {
    fn record(&mut self, kind: ElementKind) {
        match kind {
            ElementKind::Node => self.nodes += 1,
            ElementKind::Way => self.ways += 1,
            ElementKind::Relation => self.relations += 1,
        }
    }

    /// Sum over all kinds.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.nodes + self.ways + self.relations
    }
}

impl fmt::Display for KindCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}+{}", self.nodes, self.ways, self.relations)
    }
}

/// Counts of `create`/`modify` elements before and after pruning.
///
/// Displays as the one-line `nodes+ways+relations -> nodes+ways+relations`
/// summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneSummary {
    /// Elements present before pruning.
    pub before: KindCounts,
    /// Elements left after pruning.
    pub after: KindCounts,
    /// Operation groups removed because they ended up empty.
    pub removed_operations: usize,
}

impl fmt::Display for PruneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.before, self.after)
    }
}

/// Detach every element the classification drops, then remove empty
/// operation groups.
///
/// Elements under `delete` are never detached, but a `delete` group that was
/// already empty is removed like any other.
pub fn prune(document: &mut ChangeDocument, classification: &Classification) -> PruneSummary {
    let mut summary = PruneSummary::default();
    for operation in document.operations_mut() {
        if !operation.action().is_trimmed() {
            continue;
        }
        for element in operation.elements() {
            summary.before.record(element.kind());
        }
        operation.retain_elements(|element| classification.keeps(element));
        for element in operation.elements() {
            summary.after.record(element.kind());
        }
    }
    summary.removed_operations = document.remove_empty_operations();
    summary
}
