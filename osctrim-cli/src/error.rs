//! Error types emitted by the osc-trim CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use osctrim_core::{BoundaryError, TrimError};
#[cfg(feature = "store-postgres")]
use osctrim_data::PostgresReferenceStoreError;
#[cfg(feature = "store-sqlite")]
use osctrim_data::SqliteReferenceStoreError;
use osctrim_data::{BoundaryLoadError, OscReadError, OscWriteError};
use thiserror::Error;

/// Errors emitted by the osc-trim CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Option name.
        field: &'static str,
        /// Environment variable that can supply it.
        env: &'static str,
    },
    /// Neither a bounding box nor a boundary file was configured.
    #[error("no region given (set --bbox, --poly or both)")]
    MissingRegion,
    /// The `--compression` value was not recognised.
    #[error("{0}")]
    InvalidCompression(String),
    /// The `--store` value was not recognised.
    #[error("unknown reference store {0:?}; expected sqlite or postgres")]
    InvalidStore(String),
    /// `--password` was given but no password is available.
    #[error("--password requires {env} to be set")]
    MissingPassword {
        /// Environment variable holding the password.
        env: &'static str,
    },
    /// The requested operation requires a missing compile-time feature.
    #[error("{action} requires the `{feature}` feature to be enabled")]
    MissingFeature {
        /// Cargo feature name.
        feature: &'static str,
        /// What was attempted.
        action: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Option naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        /// Option naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Option naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The bounding box or boundary file could not be loaded.
    #[error("failed to load region: {0}")]
    LoadRegion(#[from] BoundaryLoadError),
    /// The configured regions do not overlap.
    #[error("region is unusable: {0}")]
    Region(#[from] BoundaryError),
    /// Opening the change input failed.
    #[error("failed to open change input {input}: {source}")]
    OpenInput {
        /// Input path, or `-` for stdin.
        input: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The change input could not be parsed.
    #[error("failed to read change document from {input}: {source}")]
    ReadChange {
        /// Input path, or `-` for stdin.
        input: String,
        /// Parser error.
        #[source]
        source: OscReadError,
    },
    /// Opening the SQLite reference database failed.
    #[cfg(feature = "store-sqlite")]
    #[error(transparent)]
    OpenStore(#[from] SqliteReferenceStoreError),
    /// Connecting to the PostgreSQL reference database failed.
    #[cfg(feature = "store-postgres")]
    #[error(transparent)]
    ConnectStore(#[from] PostgresReferenceStoreError),
    /// A reference store lookup failed.
    #[error(transparent)]
    Trim(#[from] TrimError),
    /// Creating or committing the output file failed.
    #[error("failed to create output {path:?}: {source}")]
    CreateOutput {
        /// Output path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Writing the trimmed document failed.
    #[error("failed to write trimmed document to {output}: {source}")]
    WriteChange {
        /// Output path, or `-` for stdout.
        output: String,
        /// Writer error.
        #[source]
        source: OscWriteError,
    },
    /// Writing the verbose summary line failed.
    #[error("failed to write trim summary: {0}")]
    WriteSummary(#[source] std::io::Error),
}
