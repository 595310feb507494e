//! Trim command implementation for the osc-trim CLI.

use std::fmt;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::debug;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use osctrim_core::{Boundary, BoundaryOp, ChangeDocument, PruneSummary, ReferenceStore};
use osctrim_data::{
    Compression, OscWriteError, load_boundary, parse_bbox, read_change_document,
    write_change_document,
};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_BBOX, ARG_COMPRESSION, ARG_DATABASE, ARG_HOST, ARG_INPUT, ARG_OUTPUT, ARG_PASSWORD,
    ARG_POLY, ARG_PORT, ARG_PREFIX, ARG_STORE, ARG_USER, ARG_VERBOSE, CliError, ENV_DATABASE,
    ENV_INPUT, ENV_OUTPUT, ENV_PGPASSWORD, ENV_USER, init_logging,
};

/// Path standing for stdin or stdout.
const STDIO: &str = "-";
const STORE_SQLITE: &str = "sqlite";
const STORE_POSTGRES: &str = "postgres";
/// Consulted in order when `--user` is unset.
const LOGIN_VARS: [&str; 4] = ["LOGNAME", "USER", "LNAME", "USERNAME"];

/// CLI arguments for the `trim` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Trim an osmChange file to a region of interest. Edits \
                 outside the region survive only when the reference \
                 database already holds the feature they touch. Options \
                 can come from CLI flags, configuration files, or \
                 environment variables.",
    about = "Trim an osmChange file to a region and a reference database"
)]
#[ortho_config(prefix = "OSCTRIM")]
pub(crate) struct TrimArgs {
    /// Input osmChange file, `-` for stdin.
    #[arg(value_name = "input")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// Output osmChange file, `-` for stdout.
    #[arg(value_name = "output")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Reference database: an SQLite file, or a database name with
    /// `--store postgres`.
    #[arg(short = 'd', long = ARG_DATABASE, value_name = "path|name")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Reference store backend: `sqlite` (default) or `postgres`.
    #[arg(short = 's', long = ARG_STORE, value_name = "backend")]
    #[serde(default)]
    pub(crate) store: Option<String>,
    /// Table name prefix (default: `planet_osm`).
    #[arg(short = 'P', long = ARG_PREFIX, value_name = "prefix")]
    #[serde(default)]
    pub(crate) prefix: Option<String>,
    /// PostgreSQL host (default: `localhost`).
    #[arg(long = ARG_HOST, value_name = "host")]
    #[serde(default)]
    pub(crate) host: Option<String>,
    /// PostgreSQL port.
    #[arg(long = ARG_PORT, value_name = "port")]
    #[serde(default)]
    pub(crate) port: Option<u16>,
    /// PostgreSQL role (default: the login name).
    #[arg(short = 'U', long = ARG_USER, value_name = "user")]
    #[serde(default)]
    pub(crate) user: Option<String>,
    /// Authenticate with the password held in `PGPASSWORD`.
    #[arg(long = ARG_PASSWORD)]
    #[serde(default)]
    pub(crate) password: bool,
    /// Bounding box as `min_lon,min_lat,max_lon,max_lat`.
    #[arg(
        short = 'b',
        long = ARG_BBOX,
        value_name = "min_lon,min_lat,max_lon,max_lat",
        allow_hyphen_values = true
    )]
    #[serde(default)]
    pub(crate) bbox: Option<String>,
    /// Osmosis polygon or GeoJSON boundary file.
    #[arg(short = 'p', long = ARG_POLY, value_name = "path")]
    #[serde(default)]
    pub(crate) poly: Option<Utf8PathBuf>,
    /// Compression of both input and output: `none`, `gzip` or `bzip2`.
    #[arg(short = 'z', long = ARG_COMPRESSION, value_name = "kind")]
    #[serde(default)]
    pub(crate) compression: Option<String>,
    /// Log debug information and print the element counts.
    #[arg(short = 'v', long = ARG_VERBOSE)]
    #[serde(default)]
    pub(crate) verbose: bool,
}

impl TrimArgs {
    pub(crate) fn into_config(self) -> Result<TrimConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        TrimConfig::try_from(merged)
    }
}

/// Where a change document is read from or written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Endpoint {
    /// Process stdin or stdout.
    Stdio,
    /// A file on disk.
    File(Utf8PathBuf),
}

impl Endpoint {
    fn from_path(path: Utf8PathBuf) -> Self {
        if path.as_str() == STDIO {
            Self::Stdio
        } else {
            Self::File(path)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => f.write_str(STDIO),
            Self::File(path) => write!(f, "{path}"),
        }
    }
}

/// One contribution to the region of interest.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RegionSource {
    /// A bounding box parsed from `--bbox`.
    Bbox(Boundary),
    /// A polygon or GeoJSON file, told apart when loaded.
    BoundaryFile(Utf8PathBuf),
}

impl RegionSource {
    fn load(&self) -> Result<Boundary, CliError> {
        match self {
            Self::Bbox(boundary) => Ok(boundary.clone()),
            Self::BoundaryFile(path) => Ok(load_boundary(path)?),
        }
    }
}

/// PostgreSQL connection settings resolved from the CLI layers.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct PostgresTarget {
    pub(crate) dbname: String,
    pub(crate) host: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) user: String,
    pub(crate) password: Option<String>,
}

impl fmt::Debug for PostgresTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresTarget")
            .field("dbname", &self.dbname)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Where known feature ids are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StoreSource {
    /// SQLite file mirroring the `osm2pgsql` tables.
    Sqlite(Utf8PathBuf),
    /// Live `osm2pgsql` import.
    Postgres(PostgresTarget),
}

impl StoreSource {
    fn resolve(
        args: &TrimArgs,
        database: Utf8PathBuf,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, CliError> {
        match args.store.as_deref().unwrap_or(STORE_SQLITE) {
            STORE_SQLITE => Ok(Self::Sqlite(database)),
            STORE_POSTGRES => {
                let user = args
                    .user
                    .clone()
                    .or_else(|| LOGIN_VARS.iter().find_map(|name| env(name)))
                    .ok_or(CliError::MissingArgument {
                        field: ARG_USER,
                        env: ENV_USER,
                    })?;
                let password = if args.password {
                    Some(env(ENV_PGPASSWORD).ok_or(CliError::MissingPassword {
                        env: ENV_PGPASSWORD,
                    })?)
                } else {
                    None
                };
                Ok(Self::Postgres(PostgresTarget {
                    dbname: database.into_string(),
                    host: args.host.clone(),
                    port: args.port,
                    user,
                    password,
                }))
            }
            other => Err(CliError::InvalidStore(other.to_owned())),
        }
    }
}

/// Resolved `trim` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TrimConfig {
    pub(crate) input: Endpoint,
    pub(crate) output: Endpoint,
    pub(crate) store: StoreSource,
    /// Falls back to the store's default prefix when unset.
    pub(crate) prefix: Option<String>,
    /// Intersected in order; never empty.
    pub(crate) regions: Vec<RegionSource>,
    pub(crate) compression: Compression,
    pub(crate) verbose: bool,
}

impl TrimConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        if let Endpoint::File(path) = &self.input {
            Self::require_existing(path, ARG_INPUT)?;
        }
        if let StoreSource::Sqlite(path) = &self.store {
            Self::require_existing(path, ARG_DATABASE)?;
        }
        for region in &self.regions {
            if let RegionSource::BoundaryFile(path) = region {
                Self::require_existing(path, ARG_POLY)?;
            }
        }
        Ok(())
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match osctrim_fs::file_is_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::SourcePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                Err(CliError::MissingSourceFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Resolve merged arguments, reading login and password variables
    /// through `env`.
    pub(crate) fn from_args(
        args: TrimArgs,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, CliError> {
        let input_path = args.input.clone().ok_or(CliError::MissingArgument {
            field: ARG_INPUT,
            env: ENV_INPUT,
        })?;
        let output_path = args.output.clone().ok_or(CliError::MissingArgument {
            field: ARG_OUTPUT,
            env: ENV_OUTPUT,
        })?;
        let database = args.database.clone().ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_DATABASE,
        })?;
        let store = StoreSource::resolve(&args, database, env)?;

        let mut regions = Vec::new();
        if let Some(bbox) = args.bbox {
            regions.push(RegionSource::Bbox(parse_bbox(&bbox)?));
        }
        if let Some(poly) = args.poly {
            regions.push(RegionSource::BoundaryFile(poly));
        }
        if regions.is_empty() {
            return Err(CliError::MissingRegion);
        }

        let input = Endpoint::from_path(input_path);
        let compression = match (args.compression, &input) {
            (Some(value), _) => value.parse().map_err(CliError::InvalidCompression)?,
            (None, Endpoint::File(path)) => Compression::from_path(path),
            (None, Endpoint::Stdio) => Compression::None,
        };

        Ok(Self {
            input,
            output: Endpoint::from_path(output_path),
            store,
            prefix: args.prefix,
            regions,
            compression,
            verbose: args.verbose,
        })
    }
}

impl TryFrom<TrimArgs> for TrimConfig {
    type Error = CliError;

    fn try_from(args: TrimArgs) -> Result<Self, Self::Error> {
        Self::from_args(args, &|name| std::env::var(name).ok())
    }
}

pub(super) fn run_trim(args: TrimArgs) -> Result<(), CliError> {
    let config = resolve_trim_config(args)?;
    init_logging(config.verbose);
    let summary = execute_trim(&config)?;
    if config.verbose {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "{summary}").map_err(CliError::WriteSummary)?;
    }
    Ok(())
}

pub(super) fn resolve_trim_config(args: TrimArgs) -> Result<TrimConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

/// Run the pipeline for a validated configuration.
///
/// The output is staged beside its target and only renamed into place once
/// the whole document has been written, so a failed run never leaves a
/// partial file behind.
pub(super) fn execute_trim(config: &TrimConfig) -> Result<PruneSummary, CliError> {
    let region = resolve_region(&config.regions)?;
    let store = open_store(config)?;
    let mut document = read_input(&config.input, config.compression)?;
    let summary = osctrim_core::trim(&mut document, &region, store.as_ref())?;
    write_output(&config.output, config.compression, &document)?;
    Ok(summary)
}

fn open_store(config: &TrimConfig) -> Result<Box<dyn ReferenceStore>, CliError> {
    let prefix = config.prefix.as_deref();
    match &config.store {
        StoreSource::Sqlite(path) => open_sqlite(path, prefix),
        StoreSource::Postgres(target) => open_postgres(target, prefix),
    }
}

#[cfg(feature = "store-sqlite")]
fn open_sqlite(
    path: &Utf8Path,
    prefix: Option<&str>,
) -> Result<Box<dyn ReferenceStore>, CliError> {
    use osctrim_data::{DEFAULT_TABLE_PREFIX, SqliteReferenceStore};

    let store = SqliteReferenceStore::open(path, prefix.unwrap_or(DEFAULT_TABLE_PREFIX))?;
    debug!("opened reference database {path}");
    Ok(Box::new(store))
}

#[cfg(not(feature = "store-sqlite"))]
fn open_sqlite(
    path: &Utf8Path,
    _prefix: Option<&str>,
) -> Result<Box<dyn ReferenceStore>, CliError> {
    debug!("cannot open {path} without the SQLite store backend");
    Err(CliError::MissingFeature {
        feature: "store-sqlite",
        action: "trim",
    })
}

#[cfg(feature = "store-postgres")]
fn open_postgres(
    target: &PostgresTarget,
    prefix: Option<&str>,
) -> Result<Box<dyn ReferenceStore>, CliError> {
    use osctrim_data::{DEFAULT_TABLE_PREFIX, PostgresConnection, PostgresReferenceStore};

    let connection = PostgresConnection {
        dbname: target.dbname.clone(),
        host: target.host.clone(),
        port: target.port,
        user: target.user.clone(),
        password: target.password.clone(),
    };
    let store =
        PostgresReferenceStore::connect(&connection, prefix.unwrap_or(DEFAULT_TABLE_PREFIX))?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "store-postgres"))]
fn open_postgres(
    target: &PostgresTarget,
    _prefix: Option<&str>,
) -> Result<Box<dyn ReferenceStore>, CliError> {
    debug!(
        "cannot connect to {} without the PostgreSQL store backend",
        target.dbname
    );
    Err(CliError::MissingFeature {
        feature: "store-postgres",
        action: "trim",
    })
}

/// Intersect every configured region source into one non-empty boundary.
pub(super) fn resolve_region(sources: &[RegionSource]) -> Result<Boundary, CliError> {
    let mut loaded = sources.iter().map(RegionSource::load);
    let first = loaded.next().ok_or(CliError::MissingRegion)??;
    let region = loaded.try_fold(first, |area, next| {
        next.map(|boundary| area.combine(BoundaryOp::Intersection, &boundary))
    })?;
    Ok(region.non_empty()?)
}

fn read_input(input: &Endpoint, compression: Compression) -> Result<ChangeDocument, CliError> {
    let reader = match input {
        Endpoint::Stdio => compression.reader(io::stdin().lock()),
        Endpoint::File(path) => {
            let file = osctrim_fs::open_utf8_file(path).map_err(|source| CliError::OpenInput {
                input: input.to_string(),
                source,
            })?;
            compression.reader(file)
        }
    };
    let document = read_change_document(reader).map_err(|source| CliError::ReadChange {
        input: input.to_string(),
        source,
    })?;
    debug!(
        "read {} operation groups from {input}",
        document.operations().len()
    );
    Ok(document)
}

fn write_output(
    output: &Endpoint,
    compression: Compression,
    document: &ChangeDocument,
) -> Result<(), CliError> {
    match output {
        Endpoint::Stdio => {
            write_document(io::stdout().lock(), output, compression, document)?;
            Ok(())
        }
        Endpoint::File(path) => {
            let create_failed = |source| CliError::CreateOutput {
                path: path.clone(),
                source,
            };
            let (staged, file) = osctrim_fs::StagedFile::create(path).map_err(create_failed)?;
            let written = write_document(file, output, compression, document)?;
            staged.commit(written).map_err(create_failed)
        }
    }
}

/// Serialise `document` into `target`, handing the target back once the
/// encoder has finished.
fn write_document<W: Write>(
    target: W,
    output: &Endpoint,
    compression: Compression,
    document: &ChangeDocument,
) -> Result<W, CliError> {
    let failed = |source: OscWriteError| CliError::WriteChange {
        output: output.to_string(),
        source,
    };
    let mut writer = compression.writer(target);
    write_change_document(&mut writer, document).map_err(failed)?;
    writer
        .finish()
        .map_err(|source| failed(OscWriteError::Io(source)))
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<TrimConfig, CliError> {
    let merged = TrimArgs::merge_from_layers(layers).map_err(CliError::from)?;
    TrimConfig::try_from(merged)
}
