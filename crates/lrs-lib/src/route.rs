//! Route assembly module
//!
//! A [`Route`] buffers all lines sharing one route id and chains them into maximal
//! connected [`RoutePart`]s. Lines connect when they share an endpoint; chains only
//! continue through nodes where exactly two line ends meet, so forks end parts.

use crate::utils::{self, LineLocation};
use crate::{CalibrationError, ErrorKind, LrsError, Provenance, Result, RoutePart, Segment};
use geo::{Coord, LineString, Point};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A raw line waiting to be chained into a part
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct RouteLine {
    polyline: LineString<f64>,
    origin: Provenance,
}

/// Line ends meeting in one node: (line index, true if at the line start)
type NodeEnds = SmallVec<[(usize, bool); 2]>;

/// All parts of a single route
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Route {
    route_id: String,
    /// Lines buffered until `build_parts`
    lines: Vec<RouteLine>,
    parts: Vec<RoutePart>,
    /// Errors of the route itself (parts keep their own)
    errors: Vec<CalibrationError>,
    built: bool,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Route {
    pub fn new(route_id: impl Into<String>) -> Self {
        Self {
            route_id: route_id.into(),
            lines: Vec::new(),
            parts: Vec::new(),
            errors: Vec::new(),
            built: false,
        }
    }

    #[inline]
    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    #[inline]
    pub fn parts(&self) -> &[RoutePart] {
        &self.parts
    }

    #[inline]
    pub(crate) fn part_mut(&mut self, index: usize) -> Option<&mut RoutePart> {
        self.parts.get_mut(index)
    }

    /// Buffer a line for part assembly
    ///
    /// Degenerate lines are ignored and lines identical to an already buffered one
    /// are reported as duplicates.
    pub fn add_line(&mut self, polyline: LineString<f64>, origin: Provenance) {
        if self.built {
            tracing::warn!("Route {} parts already built, ignoring line {origin}", self.route_id);
            return;
        }
        if polyline.0.len() < 2 || utils::polyline_length(&polyline) == 0.0 {
            tracing::warn!("Skipping degenerate line {origin} of route {}", self.route_id);
            return;
        }
        if self
            .lines
            .iter()
            .any(|line| utils::polylines_identical(&line.polyline, &polyline))
        {
            self.errors.push(
                CalibrationError::new(ErrorKind::DuplicateLine, polyline)
                    .with_route(self.route_id.clone())
                    .with_origins([origin]),
            );
            return;
        }

        self.lines.push(RouteLine { polyline, origin });
    }

    /// Partition buffered lines into connected chains, one part per chain
    pub fn build_parts(&mut self) {
        if self.built {
            return;
        }
        self.built = true;

        let lines = std::mem::take(&mut self.lines);
        let nodes = Self::index_nodes(&lines);
        self.report_forks(&lines, &nodes);

        let mut used = vec![false; lines.len()];
        for start in 0..lines.len() {
            if used[start] {
                continue;
            }
            used[start] = true;

            let mut coords = lines[start].polyline.0.clone();
            let mut origins = vec![lines[start].origin];

            Self::extend_chain(&lines, &nodes, &mut used, &mut coords, &mut origins);
            // Grow the other end by walking the reversed chain
            coords.reverse();
            origins.reverse();
            Self::extend_chain(&lines, &nodes, &mut used, &mut coords, &mut origins);
            coords.reverse();
            origins.reverse();

            match RoutePart::new(LineString::new(coords), self.route_id.clone(), origins) {
                Ok(part) => self.parts.push(part),
                Err(err) => tracing::warn!("Cannot build part of route {}: {err}", self.route_id),
            }
        }

        tracing::debug!(
            "Route {}: {} lines chained into {} parts",
            self.route_id,
            lines.len(),
            self.parts.len()
        );
    }

    fn index_nodes(lines: &[RouteLine]) -> HashMap<(u64, u64), NodeEnds> {
        let mut nodes: HashMap<(u64, u64), NodeEnds> = HashMap::new();
        for (index, line) in lines.iter().enumerate() {
            let coords = &line.polyline.0;
            nodes
                .entry(utils::coord_key(coords[0]))
                .or_default()
                .push((index, true));
            nodes
                .entry(utils::coord_key(coords[coords.len() - 1]))
                .or_default()
                .push((index, false));
        }
        nodes
    }

    fn report_forks(&mut self, lines: &[RouteLine], nodes: &HashMap<(u64, u64), NodeEnds>) {
        let mut forks: Vec<(Coord<f64>, &NodeEnds)> = nodes
            .values()
            .filter(|ends| ends.len() > 2)
            .map(|ends| {
                let (index, at_start) = ends[0];
                (line_end(&lines[index].polyline, at_start), ends)
            })
            .collect();
        // Node map order is arbitrary
        forks.sort_by(|a, b| a.0.x.total_cmp(&b.0.x).then(a.0.y.total_cmp(&b.0.y)));

        for (coord, ends) in forks {
            self.errors.push(
                CalibrationError::new(ErrorKind::Fork, Point::from(coord))
                    .with_route(self.route_id.clone())
                    .with_origins(ends.iter().map(|&(index, _)| lines[index].origin)),
            );
        }
    }

    /// Append unused lines to the end of the chain while its end node joins exactly two lines
    fn extend_chain(
        lines: &[RouteLine],
        nodes: &HashMap<(u64, u64), NodeEnds>,
        used: &mut [bool],
        coords: &mut Vec<Coord<f64>>,
        origins: &mut Vec<Provenance>,
    ) {
        loop {
            let Some(&end) = coords.last() else {
                return;
            };
            let Some(ends) = nodes.get(&utils::coord_key(end)) else {
                return;
            };
            if ends.len() != 2 {
                return;
            }
            let Some(&(next, at_start)) = ends.iter().find(|&&(index, _)| !used[index]) else {
                return;
            };

            used[next] = true;
            let line = &lines[next];
            if at_start {
                coords.extend(line.polyline.0.iter().skip(1));
            } else {
                coords.extend(line.polyline.0.iter().rev().skip(1));
            }
            origins.push(line.origin);
        }
    }

    /// Nearest part within `threshold` of `point`
    pub fn nearest_part(&self, point: Coord<f64>, threshold: f64) -> Option<(usize, LineLocation)> {
        self.parts
            .iter()
            .enumerate()
            .filter(|(_, part)| {
                let bbox = part.bounding_box();
                point.x >= bbox.min().x - threshold
                    && point.x <= bbox.max().x + threshold
                    && point.y >= bbox.min().y - threshold
                    && point.y <= bbox.max().y + threshold
            })
            .filter_map(|(index, part)| part.locate(point).map(|location| (index, location)))
            .filter(|(_, location)| location.offset <= threshold)
            .min_by(|a, b| a.1.offset.total_cmp(&b.1.offset))
    }

    /// Calibrate all parts, then check for measures referenced on more than one part
    pub fn calibrate(&mut self) {
        self.parts.par_iter_mut().for_each(RoutePart::calibrate);
        self.check_duplicate_referencing();
    }

    /// One error per pair of records on different parts with overlapping measures
    fn check_duplicate_referencing(&mut self) {
        for (i, a) in self.parts.iter().enumerate() {
            for b in &self.parts[i + 1..] {
                let pairs = a.records().iter().flat_map(|ra| {
                    b.records()
                        .iter()
                        .filter(move |rb| ra.measure_overlaps(rb))
                });
                for rb in pairs {
                    let geometry = b
                        .segment_geometry(rb)
                        .unwrap_or_else(|_| b.polyline().clone());
                    self.errors.push(
                        CalibrationError::new(ErrorKind::DuplicateReferencing, geometry)
                            .with_route(self.route_id.clone())
                            .with_measure(rb.measure_from)
                            .with_origins(b.origins().iter().copied()),
                    );
                }
            }
        }
    }

    /// Errors of the route and of all its parts
    pub fn errors(&self) -> impl Iterator<Item = &CalibrationError> + '_ {
        self.errors
            .iter()
            .chain(self.parts.iter().flat_map(|part| part.errors()))
    }

    /// Point at `measure` on the first part able to locate it
    pub fn point_at_measure(&self, measure: f64) -> Option<Coord<f64>> {
        self.parts
            .iter()
            .find_map(|part| part.point_at_measure(measure).ok())
    }

    /// Geometry between two measures on the first part holding both
    ///
    /// Fails with `MeasureNotAvailable` for a measure no part holds, and with
    /// `MeasuresOnDifferentParts` when each measure is held by a different part.
    pub fn range_geometry(&self, measure_from: f64, measure_to: f64) -> Result<LineString<f64>> {
        let holds = |part: &RoutePart, measure: f64| part.distance_at_measure(measure).is_some();

        if let Some(part) = self
            .parts
            .iter()
            .find(|part| holds(part, measure_from) && holds(part, measure_to))
        {
            return part.range_geometry(measure_from, measure_to);
        }

        for measure in [measure_from, measure_to] {
            if !self.parts.iter().any(|part| holds(part, measure)) {
                return Err(LrsError::MeasureNotAvailable {
                    route_id: self.route_id.clone(),
                    measure,
                });
            }
        }
        Err(LrsError::MeasuresOnDifferentParts {
            route_id: self.route_id.clone(),
            measure_from,
            measure_to,
        })
    }

    /// Measure of a point within `threshold` of the route
    pub fn measure_at_point(&self, point: Coord<f64>, threshold: f64) -> Option<f64> {
        let (index, location) = self.nearest_part(point, threshold)?;
        let part = &self.parts[index];
        let distance =
            utils::measure_along_polyline(part.polyline(), location.segment_index, location.point);
        part.measure_at_distance(distance)
    }

    /// Geometries of all calibrated records of all parts
    pub fn segments(&self) -> Vec<Segment> {
        self.parts.iter().flat_map(|part| part.segments()).collect()
    }
}

#[inline]
fn line_end(polyline: &LineString<f64>, at_start: bool) -> Coord<f64> {
    if at_start {
        polyline.0[0]
    } else {
        polyline.0[polyline.0.len() - 1]
    }
}
