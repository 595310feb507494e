//! Reference stores over the tables an `osm2pgsql` slim import leaves behind.
//!
//! Both backends read `{prefix}_nodes`, `{prefix}_ways` and `{prefix}_rels`,
//! each with an integer `id` column, and only ever select identifiers.

use osctrim_core::ElementKind;

#[cfg(feature = "store-postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "store-postgres")))]
mod pg;
#[cfg(feature = "store-sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "store-sqlite")))]
mod sqlite;

#[cfg(feature = "store-postgres")]
pub use pg::{PostgresConnection, PostgresReferenceStore, PostgresReferenceStoreError};
#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteReferenceStore, SqliteReferenceStoreError};

/// Table prefix used by a default `osm2pgsql` import.
pub const DEFAULT_TABLE_PREFIX: &str = "planet_osm";

/// Whether `prefix` can be spliced into a query as a bare identifier.
#[must_use]
pub fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Name of the table holding identifiers of `kind`.
#[must_use]
pub fn table_name(prefix: &str, kind: ElementKind) -> String {
    let suffix = match kind {
        ElementKind::Node => "nodes",
        ElementKind::Way => "ways",
        ElementKind::Relation => "rels",
    };
    format!("{prefix}_{suffix}")
}
