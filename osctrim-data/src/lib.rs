//! Data adapters for the osc-trim engine.
//!
//! Responsibilities:
//! - Read and write `osmChange` XML, optionally gzip or bzip2 compressed.
//! - Load trimming regions from bounding boxes, polygon files and GeoJSON.
//! - Answer reference-store lookups from an `osm2pgsql` import, either live in
//!   PostgreSQL or mirrored into SQLite.
//!
//! Boundaries:
//! - Do not encode trimming rules (live in `osctrim-core`).
//! - Surface every I/O and parse failure; never substitute defaults.
//!
//! Invariants:
//! - Documents written back preserve element order, attributes and tags.
//! - No global mutable state.
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod boundary;
pub mod osc;
#[cfg(any(feature = "store-sqlite", feature = "store-postgres"))]
#[cfg_attr(
    docsrs,
    doc(cfg(any(feature = "store-sqlite", feature = "store-postgres")))
)]
pub mod store;

pub use boundary::{
    BoundaryFormat, BoundaryLoadError, load_boundary, parse_bbox, parse_geojson, parse_poly,
    read_boundary,
};
pub use osc::{
    CompressedWriter, Compression, OscReadError, OscWriteError, read_change_document,
    write_change_document,
};
#[cfg(feature = "store-postgres")]
pub use store::{PostgresConnection, PostgresReferenceStore, PostgresReferenceStoreError};
#[cfg(feature = "store-sqlite")]
pub use store::{SqliteReferenceStore, SqliteReferenceStoreError};
#[cfg(any(feature = "store-sqlite", feature = "store-postgres"))]
pub use store::{DEFAULT_TABLE_PREFIX, is_valid_prefix, table_name};
