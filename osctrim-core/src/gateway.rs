//! Read-only gateway to the reference store.
//!
//! The reference store holds the last-known state of the region. Trimming
//! asks it, once per element kind, which of a batch of identifiers it already
//! knows about. Implementations must not mutate the store and must answer the
//! same batch identically on repeated calls.

use std::collections::HashSet;
use std::error::Error as StdError;

use thiserror::Error;

use crate::ElementKind;

/// Boxed source error carried by [`ReferenceStoreError::Query`].
pub type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// Errors surfaced by a [`ReferenceStore`] lookup.
#[derive(Debug, Error)]
pub enum ReferenceStoreError {
    /// The store could not be reached at all.
    #[error("reference store is unavailable: {message}")]
    Unavailable {
        /// Human-readable reason.
        message: String,
    },
    /// A lookup query failed.
    #[error("failed to look up known {kind} ids")]
    Query {
        /// Element kind being looked up.
        kind: ElementKind,
        /// Underlying driver error.
        #[source]
        source: BoxedSource,
    },
}

/// Batched membership lookups against the reference store.
///
/// # Examples
///
/// ```rust
/// use std::collections::HashSet;
/// use osctrim_core::{ElementKind, ReferenceStore, ReferenceStoreError};
///
/// struct Everything;
///
/// impl ReferenceStore for Everything {
///     fn known_ids(
///         &self,
///         _kind: ElementKind,
///         ids: &[i64],
///     ) -> Result<HashSet<i64>, ReferenceStoreError> {
///         Ok(ids.iter().copied().collect())
///     }
/// }
///
/// let known = Everything.known_relations(&[42])?;
/// assert!(known.contains(&42));
/// # Ok::<(), ReferenceStoreError>(())
/// ```
pub trait ReferenceStore {
    /// Return the subset of `ids` of the given `kind` present in the store.
    ///
    /// # Errors
    /// Returns a [`ReferenceStoreError`] when the store cannot answer.
    fn known_ids(&self, kind: ElementKind, ids: &[i64])
    -> Result<HashSet<i64>, ReferenceStoreError>;

    /// Known node identifiers among `ids`.
    ///
    /// # Errors
    /// Propagates [`ReferenceStore::known_ids`] failures.
    fn known_nodes(&self, ids: &[i64]) -> Result<HashSet<i64>, ReferenceStoreError> {
        self.known_ids(ElementKind::Node, ids)
    }

    /// Known way identifiers among `ids`.
    ///
    /// # Errors
    /// Propagates [`ReferenceStore::known_ids`] failures.
    fn known_ways(&self, ids: &[i64]) -> Result<HashSet<i64>, ReferenceStoreError> {
        self.known_ids(ElementKind::Way, ids)
    }

    /// Known relation identifiers among `ids`.
    ///
    /// # Errors
    /// Propagates [`ReferenceStore::known_ids`] failures.
    fn known_relations(&self, ids: &[i64]) -> Result<HashSet<i64>, ReferenceStoreError> {
        self.known_ids(ElementKind::Relation, ids)
    }
}

impl<S: ReferenceStore + ?Sized> ReferenceStore for &S {
    fn known_ids(
        &self,
        kind: ElementKind,
        ids: &[i64],
    ) -> Result<HashSet<i64>, ReferenceStoreError> {
        (**self).known_ids(kind, ids)
    }
}
