//! Test helpers for laying out trim inputs on disk.

use camino::{Utf8Path, Utf8PathBuf};
use flate2::{Compression, write::GzEncoder};
use rusqlite::Connection;
use std::fs;
use std::io::Write;
use tempfile::TempDir;

/// Change document spanning a 0..10 square region.
///
/// Node 1 is the only coordinate inside the square. Way 200 and relation 300
/// are the features a reference database is expected to know.
pub(super) const REGIONAL_CHANGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osmChange version="0.6" generator="replication">
  <create>
    <node id="1" version="1" lat="5.0" lon="5.0">
      <tag k="amenity" v="bench"/>
    </node>
    <node id="2" version="1" lat="20.0" lon="20.0"/>
    <way id="100" version="1">
      <nd ref="1"/>
      <nd ref="2"/>
      <tag k="highway" v="footway"/>
    </way>
  </create>
  <modify>
    <node id="3" version="4" lat="30.0" lon="30.0"/>
    <node id="4" version="2" lat="40.0" lon="40.0"/>
    <way id="200" version="6">
      <nd ref="3"/>
    </way>
    <way id="201" version="2">
      <nd ref="4"/>
    </way>
    <relation id="300" version="9">
      <member type="way" ref="200" role="outer"/>
    </relation>
    <relation id="301" version="3">
      <member type="node" ref="4" role="stop"/>
    </relation>
  </modify>
  <delete>
    <node id="9" version="3" user="surveyor" lat="80.0" lon="80.0"/>
  </delete>
</osmChange>
"#;

/// Osmosis polygon covering the 0..10 square.
pub(super) const SQUARE_POLY: &str = "square\n1\n  0 0\n  10 0\n  10 10\n  0 10\n  0 0\nEND\nEND\n";

/// Scratch directory holding the files a trim run reads and writes.
#[derive(Debug)]
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub(super) fn write(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.path(name);
        fs::write(&path, contents).unwrap_or_else(|err| panic!("failed to write {path}: {err}"));
        path
    }

    pub(super) fn write_gzip(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.path(name);
        let file = fs::File::create(&path).unwrap_or_else(|err| {
            panic!("failed to create {path}: {err}");
        });
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder
            .write_all(contents.as_bytes())
            .unwrap_or_else(|err| panic!("failed to compress {path}: {err}"));
        encoder
            .finish()
            .unwrap_or_else(|err| panic!("failed to finish {path}: {err}"));
        path
    }

    /// Create `reference.db` knowing the given way and relation ids.
    pub(super) fn reference_database(&self, ways: &[i64], relations: &[i64]) -> Utf8PathBuf {
        let path = self.path("reference.db");
        let connection = open_database(&path);
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

    /// Create `reference.db` as a valid SQLite file without any tables.
    pub(super) fn empty_database(&self) -> Utf8PathBuf {
        let path = self.path("reference.db");
        open_database(&path)
            .execute_batch("CREATE TABLE unrelated (id INTEGER PRIMARY KEY);")
            .unwrap_or_else(|err| panic!("failed to create schema: {err}"));
        path
    }
}

fn open_database(path: &Utf8Path) -> Connection {
    Connection::open(path.as_std_path()).unwrap_or_else(|err| {
        panic!("failed to create reference database {path}: {err}");
    })
}
