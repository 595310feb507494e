//! SQLite-backed reference store.
//!
//! The database mirrors the `osm2pgsql` tables, typically exported from a
//! live import for offline runs.

use std::collections::HashSet;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use osctrim_core::{ElementKind, ReferenceStore, ReferenceStoreError};
use rusqlite::{Connection, OpenFlags, params_from_iter};
use thiserror::Error;

use super::{is_valid_prefix, table_name};

/// SQLite limits bound parameters per statement to 999 by default. Lookups
/// are chunked to remain below that ceiling.
const SQLITE_MAX_VARIABLE_NUMBER: usize = 999;

/// Errors raised by [`SqliteReferenceStore`].
#[derive(Debug, Error)]
pub enum SqliteReferenceStoreError {
    /// Opening the SQLite database failed.
    #[error("failed to open reference database at {path}")]
    Open {
        /// Location of the database on disk.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The table prefix would not form a plain SQL identifier.
    #[error("invalid table prefix {prefix:?}; use ASCII letters, digits and underscores")]
    InvalidPrefix {
        /// Rejected prefix.
        prefix: String,
    },
    /// A lookup statement failed.
    #[error("failed to query {table}")]
    Query {
        /// Table being queried.
        table: String,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
}

/// Read-only [`ReferenceStore`] over an SQLite database.
pub struct SqliteReferenceStore {
    connection: Connection,
    prefix: String,
}

impl fmt::Debug for SqliteReferenceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteReferenceStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl SqliteReferenceStore {
    /// Open `path` read-only, reading tables named `{prefix}_nodes` and so on.
    ///
    /// # Errors
    /// Returns [`SqliteReferenceStoreError::InvalidPrefix`] when `prefix` is
    /// not a plain identifier, or [`SqliteReferenceStoreError::Open`] when the
    /// database cannot be opened.
    pub fn open(path: &Utf8Path, prefix: &str) -> Result<Self, SqliteReferenceStoreError> {
        if !is_valid_prefix(prefix) {
            return Err(SqliteReferenceStoreError::InvalidPrefix {
                prefix: prefix.to_owned(),
            });
        }
        let connection = Connection::open_with_flags(
            path.as_std_path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| SqliteReferenceStoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            connection,
            prefix: prefix.to_owned(),
        })
    }

    /// Table holding identifiers of `kind`.
    #[must_use]
    pub fn table(&self, kind: ElementKind) -> String {
        table_name(&self.prefix, kind)
    }

    fn query_chunk(
        &self,
        table: &str,
        ids: &[i64],
        known: &mut HashSet<i64>,
    ) -> Result<(), SqliteReferenceStoreError> {
        let query_failed = |source| SqliteReferenceStoreError::Query {
            table: table.to_owned(),
            source,
        };
        let placeholders = vec!["?"; ids.len()].join(", ");
        let query = format!("SELECT id FROM {table} WHERE id IN ({placeholders})");
        let mut statement = self.connection.prepare(&query).map_err(query_failed)?;
        let rows = statement
            .query_map(params_from_iter(ids.iter()), |row| row.get::<_, i64>(0))
            .map_err(query_failed)?;
        for row in rows {
            known.insert(row.map_err(query_failed)?);
        }
        Ok(())
    }
}

impl ReferenceStore for SqliteReferenceStore {
    fn known_ids(
        &self,
        kind: ElementKind,
        ids: &[i64],
    ) -> Result<HashSet<i64>, ReferenceStoreError> {
        let table = self.table(kind);
        let mut known = HashSet::new();
        for chunk in ids.chunks(SQLITE_MAX_VARIABLE_NUMBER) {
            self.query_chunk(&table, chunk, &mut known)
                .map_err(|source| ReferenceStoreError::Query {
                    kind,
                    source: Box::new(source),
                })?;
        }
        debug!("{} of {} {kind} ids known to {table}", known.len(), ids.len());
        Ok(known)
    }
}
