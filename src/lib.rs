//! Facade crate for the osmChange trimmer.
//!
//! This crate re-exports the core trimming engine and exposes the file and
//! store adapters behind feature flags.

#![forbid(unsafe_code)]

pub use osctrim_core::{
    Action, Boundary, BoundaryError, BoundaryOp, ChangeDocument, Element, ElementKind,
    PruneSummary, ReferenceStore, ReferenceStoreError, Region, TrimError, trim,
};

#[cfg(feature = "data")]
pub use osctrim_data::{
    BoundaryLoadError, Compression, OscReadError, OscWriteError, load_boundary, parse_bbox,
    read_change_document, write_change_document,
};

#[cfg(any(feature = "store-sqlite", feature = "store-postgres"))]
pub use osctrim_data::DEFAULT_TABLE_PREFIX;
#[cfg(feature = "store-postgres")]
pub use osctrim_data::{PostgresConnection, PostgresReferenceStore, PostgresReferenceStoreError};
#[cfg(feature = "store-sqlite")]
pub use osctrim_data::{SqliteReferenceStore, SqliteReferenceStoreError};
