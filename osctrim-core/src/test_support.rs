//! In-memory `ReferenceStore` used by unit, behaviour and property tests.
//!
//! Available under `cfg(test)` and behind the `test-support` feature.

use std::cell::RefCell;
use std::collections::HashSet;
use std::io;

use crate::{ElementKind, ReferenceStore, ReferenceStoreError};

/// Reference store backed by three in-memory id sets.
///
/// Every lookup is recorded so tests can assert how often, and with which
/// batch, the store was consulted. A store can also be told to fail lookups
/// for one element kind.
#[derive(Debug, Default)]
pub struct MemoryReferenceStore {
    nodes: HashSet<i64>,
    ways: HashSet<i64>,
    relations: HashSet<i64>,
    failing: Option<ElementKind>,
    queries: RefCell<Vec<(ElementKind, Vec<i64>)>>,
}

impl MemoryReferenceStore {
    /// Add known node identifiers.
    #[must_use]
    pub fn with_nodes<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        self.nodes.extend(ids);
        self
    }

    /// Add known way identifiers.
    #[must_use]
    pub fn with_ways<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        self.ways.extend(ids);
        self
    }

    /// Add known relation identifiers.
    #[must_use]
    pub fn with_relations<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        self.relations.extend(ids);
        self
    }

    /// Make every lookup of `kind` fail.
    #[must_use]
    pub fn failing_on(mut self, kind: ElementKind) -> Self {
        self.failing = Some(kind);
        self
    }

    /// Lookups performed so far, in call order.
    #[must_use]
    pub fn queries(&self) -> Vec<(ElementKind, Vec<i64>)> {
        self.queries.borrow().clone()
    }

    /// Number of lookups performed for `kind`.
    #[must_use]
    pub fn query_count(&self, kind: ElementKind) -> usize {
        self.queries
            .borrow()
            .iter()
            .filter(|(queried, _)| *queried == kind)
            .count()
    }

    const fn table(&self, kind: ElementKind) -> &HashSet<i64> {
        match kind {
            ElementKind::Node => &self.nodes,
            ElementKind::Way => &self.ways,
            ElementKind::Relation => &self.relations,
        }
    }
}

impl ReferenceStore for MemoryReferenceStore {
    fn known_ids(
        &self,
        kind: ElementKind,
        ids: &[i64],
    ) -> Result<HashSet<i64>, ReferenceStoreError> {
        self.queries.borrow_mut().push((kind, ids.to_vec()));
        if self.failing == Some(kind) {
            return Err(ReferenceStoreError::Query {
                kind,
                source: Box::new(io::Error::other("injected lookup failure")),
            });
        }
        let table = self.table(kind);
        Ok(ids.iter().copied().filter(|id| table.contains(id)).collect())
    }
}
