//! Utility functions for polyline measurement and sub-geometry extraction
//!
//! All distances are planar (Euclidean) in the working coordinate system units.

use crate::{LrsError, Result};
use geo::{Closest, ClosestPoint, Coord, Line, LineString, Point};

/// Relative tolerance used when a distance is compared against a polyline length.
///
/// Lengths summed in opposite vertex order can differ in the last bits, so a distance
/// computed on a reversed polyline may overshoot the total length slightly.
pub const LENGTH_TOLERANCE: f64 = 1e-9;

/// Location of a point projected onto a polyline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineLocation {
    /// Index of the segment (`polyline[i] -> polyline[i + 1]`) holding the projection
    pub segment_index: usize,
    /// The projected point on the segment
    pub point: Coord<f64>,
    /// Distance between the queried point and its projection
    pub offset: f64,
}

/// Euclidean distance between two coordinates
#[inline(always)]
pub fn distance(p1: Coord<f64>, p2: Coord<f64>) -> f64 {
    (p2.x - p1.x).hypot(p2.y - p1.y)
}

/// Length of the segment starting at vertex `segment`
#[inline]
pub fn segment_length(polyline: &LineString<f64>, segment: usize) -> f64 {
    distance(polyline.0[segment], polyline.0[segment + 1])
}

/// Total planar length of a polyline
pub fn polyline_length(polyline: &LineString<f64>) -> f64 {
    polyline.0.windows(2).map(|w| distance(w[0], w[1])).sum()
}

/// Distance along the polyline from its start to `point`, which must lie on `segment`
///
/// No projection is performed: the full lengths of the segments before `segment` are
/// summed and the distance from the segment start to `point` is added.
pub fn measure_along_polyline(polyline: &LineString<f64>, segment: usize, point: Coord<f64>) -> f64 {
    let before: f64 = (0..segment).map(|i| segment_length(polyline, i)).sum();
    before + distance(polyline.0[segment], point)
}

/// Place a point on the line `p1 -> p2` at `distance` from `p1`
///
/// Distances outside `[0, |p1p2|]` extrapolate along the same direction. A degenerate
/// segment yields `p1`.
#[inline]
pub fn point_at_distance(p1: Coord<f64>, p2: Coord<f64>, distance: f64) -> Coord<f64> {
    let length = self::distance(p1, p2);
    if length == 0.0 {
        return p1;
    }
    let k = distance / length;
    Coord {
        x: p1.x + k * (p2.x - p1.x),
        y: p1.y + k * (p2.y - p1.y),
    }
}

/// Point at `distance` measured along the polyline from its first vertex
///
/// Returns `None` if the distance is negative or beyond the polyline length.
pub fn point_along_polyline(polyline: &LineString<f64>, distance: f64) -> Option<Coord<f64>> {
    if polyline.0.len() < 2 || distance < 0.0 {
        return None;
    }

    let mut walked = 0.0;
    for w in polyline.0.windows(2) {
        let length = self::distance(w[0], w[1]);
        if distance <= walked + length {
            return Some(point_at_distance(w[0], w[1], distance - walked));
        }
        walked += length;
    }

    // Allow rounding overshoot at the very end
    let last = *polyline.0.last()?;
    (distance - walked <= tolerance(walked)).then_some(last)
}

/// Extract the part of `polyline` between distances `from` and `to` measured along it
///
/// The result starts with the interpolated point at `from`, continues through every
/// vertex strictly inside the range and ends with the interpolated point at `to`.
pub fn sub_polyline(polyline: &LineString<f64>, from: f64, to: f64) -> Result<LineString<f64>> {
    let total = polyline_length(polyline);
    if to <= from || from < 0.0 || to > total + tolerance(total) {
        return Err(LrsError::EmptyRange { from, to });
    }

    let mut coords: Vec<Coord<f64>> = Vec::new();
    let mut walked = 0.0;
    for w in polyline.0.windows(2) {
        let (p1, p2) = (w[0], w[1]);
        let length = distance(p1, p2);

        if coords.is_empty() && from <= walked + length {
            push_distinct(&mut coords, point_at_distance(p1, p2, from - walked));
        }

        if !coords.is_empty() {
            if to < walked + length {
                push_distinct(&mut coords, point_at_distance(p1, p2, to - walked));
                break;
            }
            push_distinct(&mut coords, p2);
        }

        walked += length;
    }

    if coords.len() < 2 {
        return Err(LrsError::EmptyRange { from, to });
    }
    Ok(LineString::new(coords))
}

/// Test if two polylines are identical, including reversed vertex order
pub fn polylines_identical(a: &LineString<f64>, b: &LineString<f64>) -> bool {
    if a.0 == b.0 {
        return true;
    }
    a.0.len() == b.0.len() && a.0.iter().eq(b.0.iter().rev())
}

/// Project `point` onto the nearest segment of `polyline`
///
/// Returns `None` for polylines with fewer than two vertices.
pub fn nearest_location(polyline: &LineString<f64>, point: Coord<f64>) -> Option<LineLocation> {
    let target = Point::from(point);
    let mut best: Option<LineLocation> = None;

    for (segment_index, w) in polyline.0.windows(2).enumerate() {
        let line = Line::new(w[0], w[1]);
        let projected = match line.closest_point(&target) {
            Closest::Intersection(p) | Closest::SinglePoint(p) => p.0,
            Closest::Indeterminate => w[0],
        };
        let offset = distance(point, projected);

        if best.is_none_or(|b| offset < b.offset) {
            best = Some(LineLocation {
                segment_index,
                point: projected,
                offset,
            });
        }
    }

    best
}

/// Hashable key of a coordinate for exact endpoint matching
#[inline(always)]
pub fn coord_key(coord: Coord<f64>) -> (u64, u64) {
    // Normalize negative zero so that 0.0 and -0.0 share a node
    ((coord.x + 0.0).to_bits(), (coord.y + 0.0).to_bits())
}

#[inline]
fn tolerance(length: f64) -> f64 {
    LENGTH_TOLERANCE * length.max(1.0)
}

#[inline]
fn push_distinct(coords: &mut Vec<Coord<f64>>, coord: Coord<f64>) {
    if coords.last() != Some(&coord) {
        coords.push(coord);
    }
}
