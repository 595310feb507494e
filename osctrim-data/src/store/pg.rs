//! PostgreSQL reference store reading a live `osm2pgsql` import.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;

use log::debug;
use osctrim_core::{ElementKind, ReferenceStore, ReferenceStoreError};
use postgres::{Client, Config, NoTls};
use thiserror::Error;

use super::{is_valid_prefix, table_name};

const DEFAULT_HOST: &str = "localhost";

/// Connection parameters for a PostgreSQL reference database.
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConnection {
    /// Database name.
    pub dbname: String,
    /// Host name or socket directory; `localhost` when unset.
    pub host: Option<String>,
    /// Port; the server default when unset.
    pub port: Option<u16>,
    /// Role to connect as.
    pub user: String,
    /// Password, if the server asks for one.
    pub password: Option<String>,
}

impl PostgresConnection {
    fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Driver configuration for these parameters.
    #[must_use]
    pub fn config(&self) -> Config {
        let mut config = Config::new();
        config
            .dbname(&self.dbname)
            .user(&self.user)
            .host(self.host());
        if let Some(port) = self.port {
            config.port(port);
        }
        if let Some(password) = &self.password {
            config.password(password);
        }
        config
    }
}

impl fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("dbname", &self.dbname)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Errors raised by [`PostgresReferenceStore`].
#[derive(Debug, Error)]
pub enum PostgresReferenceStoreError {
    /// The table prefix would not form a plain SQL identifier.
    #[error("invalid table prefix {prefix:?}; use ASCII letters, digits and underscores")]
    InvalidPrefix {
        /// Rejected prefix.
        prefix: String,
    },
    /// Connecting to the server failed.
    #[error("failed to connect to reference database {dbname} on {host}")]
    Connect {
        /// Database name.
        dbname: String,
        /// Host the connection was attempted against.
        host: String,
        /// Source error returned by `postgres`.
        #[source]
        source: postgres::Error,
    },
    /// A lookup statement failed.
    #[error("failed to query {table}")]
    Query {
        /// Table being queried.
        table: String,
        /// Source error returned by `postgres`.
        #[source]
        source: postgres::Error,
    },
}

/// Read-only [`ReferenceStore`] over a PostgreSQL database.
///
/// Each lookup sends the whole batch as one array parameter.
pub struct PostgresReferenceStore {
    client: RefCell<Client>,
    prefix: String,
}

impl fmt::Debug for PostgresReferenceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresReferenceStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl PostgresReferenceStore {
    /// Connect using `connection`, reading tables named `{prefix}_nodes` and
    /// so on.
    ///
    /// # Errors
    /// Returns [`PostgresReferenceStoreError::InvalidPrefix`] before any
    /// network traffic when `prefix` is not a plain identifier, or
    /// [`PostgresReferenceStoreError::Connect`] when the server cannot be
    /// reached or rejects the credentials.
    pub fn connect(
        connection: &PostgresConnection,
        prefix: &str,
    ) -> Result<Self, PostgresReferenceStoreError> {
        if !is_valid_prefix(prefix) {
            return Err(PostgresReferenceStoreError::InvalidPrefix {
                prefix: prefix.to_owned(),
            });
        }
        let client = connection.config().connect(NoTls).map_err(|source| {
            PostgresReferenceStoreError::Connect {
                dbname: connection.dbname.clone(),
                host: connection.host().to_owned(),
                source,
            }
        })?;
        debug!(
            "connected to {} on {} as {}",
            connection.dbname,
            connection.host(),
            connection.user
        );
        Ok(Self {
            client: RefCell::new(client),
            prefix: prefix.to_owned(),
        })
    }

    /// Table holding identifiers of `kind`.
    #[must_use]
    pub fn table(&self, kind: ElementKind) -> String {
        table_name(&self.prefix, kind)
    }

    fn query(&self, table: &str, ids: &[i64]) -> Result<HashSet<i64>, PostgresReferenceStoreError> {
        let query_failed = |source| PostgresReferenceStoreError::Query {
            table: table.to_owned(),
            source,
        };
        let rows = self
            .client
            .borrow_mut()
            .query(lookup_query(table).as_str(), &[&ids])
            .map_err(query_failed)?;
        rows.iter()
            .map(|row| row.try_get::<_, i64>(0))
            .collect::<Result<HashSet<i64>, _>>()
            .map_err(query_failed)
    }
}

fn lookup_query(table: &str) -> String {
    format!("SELECT id FROM {table} WHERE id = ANY($1)")
}

impl ReferenceStore for PostgresReferenceStore {
    fn known_ids(
        &self,
        kind: ElementKind,
        ids: &[i64],
    ) -> Result<HashSet<i64>, ReferenceStoreError> {
        let table = self.table(kind);
        let known = self
            .query(&table, ids)
            .map_err(|source| ReferenceStoreError::Query {
                kind,
                source: Box::new(source),
            })?;
        debug!("{} of {} {kind} ids known to {table}", known.len(), ids.len());
        Ok(known)
    }
}
