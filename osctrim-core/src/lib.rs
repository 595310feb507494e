//! Core domain model and trimming engine for `osmChange` documents.
//!
//! A trim run classifies every node, way and relation under `create` and
//! `modify` against a [`Region`] and a read-only [`ReferenceStore`], then
//! prunes the [`ChangeDocument`] in place. Parsing, serialisation and store
//! adapters live in `osctrim-data`.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod change;
pub mod classify;
pub mod gateway;
pub mod prune;
pub mod region;
#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;
pub mod trim;

pub use change::{
    Action, Attributes, ChangeDocument, Element, ElementError, ElementKind, Header, Member, Node,
    Operation, Relation, Tag, Way,
};
pub use classify::{Classification, PointStatus, classify};
pub use gateway::{BoxedSource, ReferenceStore, ReferenceStoreError};
pub use prune::{KindCounts, PruneSummary, prune};
pub use region::{Boundary, BoundaryError, BoundaryOp, Region};
pub use trim::{TrimError, trim};
