//! Region-of-interest predicate and the polygon boundary that implements it.
//!
//! Coordinates use WGS84 with `x = longitude`, `y = latitude`.

use geo::{BooleanOps, Coord, Intersects, MultiPolygon, Point, Polygon, Rect};
use thiserror::Error;

/// Decide whether a coordinate lies inside the region of interest.
///
/// # Examples
///
/// ```
/// use osctrim_core::{Boundary, Region};
///
/// # fn main() -> Result<(), osctrim_core::BoundaryError> {
/// let square = Boundary::from_bbox(0.0, 0.0, 1.0, 1.0)?;
/// assert!(square.contains(0.5, 0.5));
/// assert!(square.contains(1.0, 0.5));
/// assert!(!square.contains(2.0, 2.0));
/// # Ok(())
/// # }
/// ```
pub trait Region {
    /// Return `true` when (`lon`, `lat`) is inside the region.
    ///
    /// Points on the boundary count as inside.
    fn contains(&self, lon: f64, lat: f64) -> bool;
}

impl<R: Region + ?Sized> Region for &R {
    fn contains(&self, lon: f64, lat: f64) -> bool {
        (**self).contains(lon, lat)
    }
}

/// Boolean operation used to combine two boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryOp {
    /// Area covered by either boundary.
    Union,
    /// Area covered by both boundaries.
    Intersection,
    /// Area of the first boundary not covered by the second.
    Difference,
}

/// Errors raised while building a [`Boundary`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BoundaryError {
    /// A bounding-box corner was NaN or infinite.
    #[error("bounding box coordinate {value} is not finite")]
    NonFiniteCoordinate {
        /// Offending value.
        value: f64,
    },
    /// The resolved boundary covers no area at all.
    #[error("region of interest is empty")]
    Empty,
}

/// Region of interest backed by a multipolygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    area: MultiPolygon<f64>,
}

impl Boundary {
    /// Build an axis-aligned box. Corners are normalised, so the argument
    /// order of each axis does not matter.
    ///
    /// # Errors
    /// Returns [`BoundaryError::NonFiniteCoordinate`] when any corner value is
    /// NaN or infinite.
    pub fn from_bbox(
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> Result<Self, BoundaryError> {
        if let Some(value) = [min_lon, min_lat, max_lon, max_lat]
            .into_iter()
            .find(|value| !value.is_finite())
        {
            return Err(BoundaryError::NonFiniteCoordinate { value });
        }
        let rect = Rect::new(
            Coord {
                x: min_lon,
                y: min_lat,
            },
            Coord {
                x: max_lon,
                y: max_lat,
            },
        );
        Ok(Self::from_polygon(rect.to_polygon()))
    }

    /// Wrap a single polygon.
    #[must_use]
    pub fn from_polygon(polygon: Polygon<f64>) -> Self {
        Self {
            area: MultiPolygon::new(vec![polygon]),
        }
    }

    /// Wrap a multipolygon.
    #[must_use]
    pub const fn from_multi_polygon(area: MultiPolygon<f64>) -> Self {
        Self { area }
    }

    /// Combine this boundary with `other`.
    ///
    /// # Examples
    ///
    /// ```
    /// use osctrim_core::{Boundary, BoundaryOp, Region};
    ///
    /// # fn main() -> Result<(), osctrim_core::BoundaryError> {
    /// let west = Boundary::from_bbox(0.0, 0.0, 2.0, 2.0)?;
    /// let east = Boundary::from_bbox(1.0, 0.0, 3.0, 2.0)?;
    /// let overlap = west.combine(BoundaryOp::Intersection, &east);
    /// assert!(overlap.contains(1.5, 1.0));
    /// assert!(!overlap.contains(0.5, 1.0));
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn combine(&self, op: BoundaryOp, other: &Self) -> Self {
        let area = match op {
            BoundaryOp::Union => self.area.union(&other.area),
            BoundaryOp::Intersection => self.area.intersection(&other.area),
            BoundaryOp::Difference => self.area.difference(&other.area),
        };
        Self { area }
    }

    /// Fail with [`BoundaryError::Empty`] when the boundary holds no polygon.
    ///
    /// # Errors
    /// Returns [`BoundaryError::Empty`] for an empty multipolygon.
    pub fn non_empty(self) -> Result<Self, BoundaryError> {
        if self.is_empty() {
            Err(BoundaryError::Empty)
        } else {
            Ok(self)
        }
    }

    /// Whether the boundary holds no polygon.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.area.0.is_empty()
    }

    /// Underlying multipolygon.
    #[must_use]
    pub const fn area(&self) -> &MultiPolygon<f64> {
        &self.area
    }
}

impl Region for Boundary {
    fn contains(&self, lon: f64, lat: f64) -> bool {
        lon.is_finite() && lat.is_finite() && self.area.intersects(&Point::new(lon, lat))
    }
}
