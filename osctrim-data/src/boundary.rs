//! Load trimming regions from bounding boxes, Osmosis polygon files and
//! GeoJSON.
//!
//! Polygon files list one or more sections of `lon lat` pairs, each closed by
//! `END`, with a final `END` closing the file. A section whose header starts
//! with `!` is a hole and is subtracted from the area accumulated so far;
//! every other section is added to it.

use std::io::{self, BufRead, Read};

use camino::{Utf8Path, Utf8PathBuf};
use geo::{Coord, LineString, Polygon};
use log::{debug, warn};
use osctrim_core::{Boundary, BoundaryError, BoundaryOp};
use serde_json::Value;
use thiserror::Error;

const SECTION_END: &str = "END";
const HOLE_MARKER: char = '!';
/// Bytes inspected when deciding whether a boundary file is GeoJSON.
const SNIFF_LEN: usize = 10;

/// Errors raised while loading a region boundary.
#[derive(Debug, Error)]
pub enum BoundaryLoadError {
    /// The boundary file could not be opened.
    #[error("failed to open boundary file {path:?}")]
    Open {
        /// Boundary file path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Reading boundary data failed.
    #[error("failed to read boundary data")]
    Read(#[from] io::Error),
    /// A polygon file coordinate was not a finite number.
    #[error("line {line}: invalid coordinate {value:?}")]
    InvalidCoordinate {
        /// One-based line number.
        line: usize,
        /// Raw token.
        value: String,
    },
    /// A ring had fewer than three positions.
    #[error("ring ending at line {line} has fewer than three points")]
    DegenerateRing {
        /// One-based line number of the closing `END`, or zero for GeoJSON.
        line: usize,
    },
    /// The GeoJSON text could not be parsed.
    #[error("failed to parse GeoJSON")]
    Json(#[from] serde_json::Error),
    /// The GeoJSON was valid JSON but not a usable shape.
    #[error("malformed GeoJSON: {reason}")]
    MalformedGeoJson {
        /// What was wrong.
        reason: &'static str,
    },
    /// A GeoJSON geometry was not a polygon.
    #[error("unsupported GeoJSON geometry {kind:?}; expected Polygon or MultiPolygon")]
    UnsupportedGeometry {
        /// The geometry `type`.
        kind: String,
    },
    /// A bounding box string was not four comma-separated numbers.
    #[error("invalid bounding box {value:?}; expected min_lon,min_lat,max_lon,max_lat")]
    InvalidBbox {
        /// Raw value.
        value: String,
    },
    /// The resulting region was unusable.
    #[error(transparent)]
    Region(#[from] BoundaryError),
}

/// On-disk boundary encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryFormat {
    /// Osmosis polygon filter format.
    Poly,
    /// GeoJSON feature collection, feature or geometry.
    GeoJson,
}

impl BoundaryFormat {
    /// Guess the format from the leading bytes of a file.
    ///
    /// # Examples
    /// ```
    /// use osctrim_data::BoundaryFormat;
    ///
    /// assert_eq!(BoundaryFormat::sniff(b"  {\"type\": "), BoundaryFormat::GeoJson);
    /// assert_eq!(BoundaryFormat::sniff(b"berlin\n1\n"), BoundaryFormat::Poly);
    /// ```
    #[must_use]
    pub fn sniff(head: &[u8]) -> Self {
        if head.iter().take(SNIFF_LEN).any(|byte| *byte == b'{') {
            Self::GeoJson
        } else {
            Self::Poly
        }
    }
}

/// Parse `min_lon,min_lat,max_lon,max_lat` into a box boundary.
///
/// # Errors
/// Returns [`BoundaryLoadError::InvalidBbox`] when the value does not hold
/// four numbers, or [`BoundaryLoadError::Region`] when they are not finite.
pub fn parse_bbox(value: &str) -> Result<Boundary, BoundaryLoadError> {
    let invalid = || BoundaryLoadError::InvalidBbox {
        value: value.to_owned(),
    };
    let numbers = value
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    let [min_lon, min_lat, max_lon, max_lat] = numbers.as_slice() else {
        return Err(invalid());
    };
    Ok(Boundary::from_bbox(*min_lon, *min_lat, *max_lon, *max_lat)?)
}

/// Load a boundary file, choosing the parser from its leading bytes.
///
/// # Errors
/// Returns a [`BoundaryLoadError`] when the file cannot be read or parsed, or
/// when it describes an empty area.
pub fn load_boundary(path: &Utf8Path) -> Result<Boundary, BoundaryLoadError> {
    let mut file = osctrim_fs::open_utf8_file(path).map_err(|source| BoundaryLoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    let format = BoundaryFormat::sniff(&contents);
    debug!("loading {format:?} boundary from {path}");
    read_boundary(format, contents.as_slice())
}

/// Parse a boundary in a known format.
///
/// # Errors
/// See [`parse_poly`] and [`parse_geojson`].
pub fn read_boundary<R: BufRead>(
    format: BoundaryFormat,
    input: R,
) -> Result<Boundary, BoundaryLoadError> {
    match format {
        BoundaryFormat::Poly => parse_poly(input),
        BoundaryFormat::GeoJson => parse_geojson(input),
    }
}

/// Parse an Osmosis polygon file.
///
/// Any line holding a single token opens a section, so the leading name line
/// is absorbed as a section header. A hole that precedes every outer ring is
/// ignored.
///
/// # Errors
/// Returns a [`BoundaryLoadError`] for unreadable input, non-numeric
/// coordinates, rings with fewer than three points, or an empty area.
///
/// # Examples
/// ```
/// use osctrim_core::Region;
/// use osctrim_data::parse_poly;
///
/// let poly = "square\n1\n  0 0\n  2 0\n  2 2\n  0 2\nEND\n!hole\n  0.5 0.5\n  1 0.5\n  1 1\nEND\nEND\n";
/// let boundary = parse_poly(poly.as_bytes()).expect("valid polygon");
/// assert!(boundary.contains(1.5, 1.5));
/// assert!(!boundary.contains(0.9, 0.6));
/// ```
pub fn parse_poly<R: BufRead>(input: R) -> Result<Boundary, BoundaryLoadError> {
    let mut area: Option<Boundary> = None;
    let mut ring: Vec<Coord<f64>> = Vec::new();
    let mut in_section = false;
    let mut hole = false;

    for (index, line) in input.lines().enumerate() {
        let line_number = index + 1;
        let raw = line?;
        let text = raw.trim();
        if text == SECTION_END {
            if !in_section {
                break;
            }
            if !ring.is_empty() {
                let polygon = Boundary::from_polygon(close_ring(&ring, line_number)?);
                area = match (area, hole) {
                    (Some(current), true) => Some(current.combine(BoundaryOp::Difference, &polygon)),
                    (Some(current), false) => Some(current.combine(BoundaryOp::Union, &polygon)),
                    (None, false) => Some(polygon),
                    (None, true) => {
                        warn!("ignoring hole at line {line_number} that precedes every outer ring");
                        None
                    }
                };
            }
            ring.clear();
            in_section = false;
        } else if !text.is_empty() && !text.contains(char::is_whitespace) {
            in_section = true;
            hole = text.starts_with(HOLE_MARKER);
        } else if !text.is_empty() && in_section {
            ring.push(parse_position(text, line_number)?);
        }
    }

    let boundary = area.ok_or(BoundaryError::Empty)?;
    Ok(boundary.non_empty()?)
}

fn parse_position(text: &str, line: usize) -> Result<Coord<f64>, BoundaryLoadError> {
    let mut tokens = text.split_whitespace();
    let mut next = || {
        let token = tokens.next().unwrap_or_default();
        token
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| BoundaryLoadError::InvalidCoordinate {
                line,
                value: token.to_owned(),
            })
    };
    let x = next()?;
    let y = next()?;
    Ok(Coord { x, y })
}

fn close_ring(points: &[Coord<f64>], line: usize) -> Result<Polygon<f64>, BoundaryLoadError> {
    let distinct = points
        .windows(2)
        .filter(|pair| matches!(pair, [a, b] if a != b))
        .count()
        + 1;
    if distinct < 3 {
        return Err(BoundaryLoadError::DegenerateRing { line });
    }
    Ok(Polygon::new(LineString::from(points.to_vec()), Vec::new()))
}

/// Parse a GeoJSON boundary.
///
/// Accepts a `FeatureCollection`, a single `Feature`, a `GeometryCollection`
/// or a bare geometry. Every `Polygon` and `MultiPolygon` found is unioned.
///
/// # Errors
/// Returns a [`BoundaryLoadError`] for invalid JSON, geometries other than
/// polygons, malformed coordinate arrays, or an empty area.
pub fn parse_geojson<R: Read>(input: R) -> Result<Boundary, BoundaryLoadError> {
    let document: Value = serde_json::from_reader(input)?;
    let mut polygons = Vec::new();
    collect_polygons(&document, &mut polygons)?;
    let boundary = polygons
        .into_iter()
        .map(Boundary::from_polygon)
        .reduce(|acc, next| acc.combine(BoundaryOp::Union, &next))
        .ok_or(BoundaryError::Empty)?;
    Ok(boundary.non_empty()?)
}

fn collect_polygons(value: &Value, out: &mut Vec<Polygon<f64>>) -> Result<(), BoundaryLoadError> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(BoundaryLoadError::MalformedGeoJson {
            reason: "object without a string `type`",
        })?;
    match kind {
        "FeatureCollection" => {
            for feature in members(value, "features")? {
                collect_polygons(feature, out)?;
            }
        }
        "Feature" => {
            let geometry = value
                .get("geometry")
                .filter(|geometry| !geometry.is_null())
                .ok_or(BoundaryLoadError::MalformedGeoJson {
                    reason: "feature without geometry",
                })?;
            collect_polygons(geometry, out)?;
        }
        "GeometryCollection" => {
            for geometry in members(value, "geometries")? {
                collect_polygons(geometry, out)?;
            }
        }
        "Polygon" => out.push(polygon(members(value, "coordinates")?)?),
        "MultiPolygon" => {
            for rings in members(value, "coordinates")? {
                out.push(polygon(as_array(rings)?)?);
            }
        }
        other => {
            return Err(BoundaryLoadError::UnsupportedGeometry {
                kind: other.to_owned(),
            });
        }
    }
    Ok(())
}

fn members<'a>(value: &'a Value, key: &str) -> Result<&'a [Value], BoundaryLoadError> {
    value
        .get(key)
        .ok_or(BoundaryLoadError::MalformedGeoJson {
            reason: "missing member array",
        })
        .and_then(as_array)
}

fn as_array(value: &Value) -> Result<&[Value], BoundaryLoadError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or(BoundaryLoadError::MalformedGeoJson {
            reason: "expected an array",
        })
}

fn polygon(rings: &[Value]) -> Result<Polygon<f64>, BoundaryLoadError> {
    let mut parsed = rings.iter().map(|ring| {
        let points = as_array(ring)?
            .iter()
            .map(position)
            .collect::<Result<Vec<_>, _>>()?;
        close_ring(&points, 0).map(Polygon::into_inner).map(|(exterior, _)| exterior)
    });
    let exterior = parsed.next().ok_or(BoundaryLoadError::MalformedGeoJson {
        reason: "polygon without rings",
    })??;
    let interiors = parsed.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn position(value: &Value) -> Result<Coord<f64>, BoundaryLoadError> {
    let malformed = BoundaryLoadError::MalformedGeoJson {
        reason: "position is not a pair of finite numbers",
    };
    match as_array(value)? {
        [x, y, ..] => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok(Coord { x, y }),
            _ => Err(malformed),
        },
        _ => Err(malformed),
    }
}
