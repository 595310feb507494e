//! Shared fixtures for the data adapter behaviour tests.

use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use flate2::{Compression, write::GzEncoder};
use rusqlite::Connection;

/// Directory containing the plain-text fixtures.
pub fn fixtures_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Gzip `fixture` into `target_dir`, returning the `.gz` path.
pub fn gzip_fixture(target_dir: &Utf8Path, fixture: &str) -> Utf8PathBuf {
    let source = fixtures_dir().join(fixture);
    let plain = fs::read(&source).unwrap_or_else(|err| {
        panic!("failed to read fixture {source}: {err}");
    });
    let target = target_dir.join(format!("{fixture}.gz"));
    let file = fs::File::create(&target).unwrap_or_else(|err| {
        panic!("failed to create {target}: {err}");
    });
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder
        .write_all(&plain)
        .unwrap_or_else(|err| panic!("failed to compress {fixture}: {err}"));
    encoder
        .finish()
        .unwrap_or_else(|err| panic!("failed to finish {target}: {err}"));
    target
}

/// Create an SQLite reference database knowing the given way and relation ids.
pub fn reference_database(target_dir: &Utf8Path, ways: &[i64], relations: &[i64]) -> Utf8PathBuf {
    let path = target_dir.join("reference.db");
    let connection = Connection::open(path.as_std_path()).unwrap_or_else(|err| {
        panic!("failed to create reference database {path}: {err}");
    });
    connection
        .execute_batch(
            "CREATE TABLE planet_osm_nodes (id INTEGER PRIMARY KEY);
             CREATE TABLE planet_osm_ways (id INTEGER PRIMARY KEY);
             CREATE TABLE planet_osm_rels (id INTEGER PRIMARY KEY);",
        )
        .unwrap_or_else(|err| panic!("failed to create schema: {err}"));
    for (table, ids) in [("planet_osm_ways", ways), ("planet_osm_rels", relations)] {
        for id in ids {
            connection
                .execute(&format!("INSERT INTO {table} (id) VALUES (?1)"), [id])
                .unwrap_or_else(|err| panic!("failed to insert {id} into {table}: {err}"));
        }
    }
    path
}
