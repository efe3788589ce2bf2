//! Route part: a chain of connected lines and its calibration
//!
//! A [`RoutePart`] owns one continuous polyline together with the milestones snapped
//! onto it. Calibration turns the milestones into an ordered table of
//! [`CalibrationRecord`]s, each mapping a measure range onto a distance range along
//! the polyline.
//!
//! # Calibration
//!
//! 1. Parts with fewer than two milestones are reported and left uncalibrated.
//! 2. Milestones are sorted by distance along the polyline (then by measure).
//! 3. Adjacent pairs vote for increasing or decreasing measure. A tie is reported and
//!    the part is left uncalibrated; a majority of decreasing votes reverses the polyline.
//! 4. Conflicts are resolved by scoring: each milestone scores +1 for every other
//!    milestone it is in order with and -1 for every one it is not (equal measures count
//!    as out of order). While any milestone is out of order, all milestones sharing the
//!    lowest score are dropped and the scores are recomputed. Dropping every tied
//!    milestone is a heuristic, it does not always keep the longest consistent sequence.
//! 5. One record is created for every pair of adjacent remaining milestones.
//!
//! Step 4 is O(n³) in the worst case (n rounds of O(n²) scoring), acceptable for the
//! tens of milestones found on a part.

use crate::utils::{self, LineLocation};
use crate::{
    CalibrationError, CalibrationRecord, ErrorKind, LrsError, Milestone, Provenance, Provenances,
    Result, Segment,
};
use geo::{BoundingRect, Coord, LineString, Point, Rect};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Chain of connected geometries of one route
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoutePart {
    polyline: LineString<f64>,
    route_id: String,
    /// Source lines the polyline was assembled from
    origins: Provenances,
    /// All milestones snapped onto this part, in insertion order
    milestones: Vec<Milestone>,
    /// Indices into `milestones` kept by calibration, ordered by distance
    good_milestones: Vec<usize>,
    records: Vec<CalibrationRecord>,
    errors: Vec<CalibrationError>,
    calibrated: bool,
    /// Cached polyline length
    length: f64,
    /// Cached bounding box, unaffected by reversal
    bounding_box: Rect<f64>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl RoutePart {
    /// Create a new uncalibrated part
    ///
    /// # Arguments
    /// * `polyline` - Chained geometry of the part, at least two vertices
    /// * `route_id` - Route the part belongs to
    /// * `origins` - Line features the part was chained from
    ///
    /// # Returns
    /// The part without milestones, or `InvalidGeometry` if the polyline has fewer
    /// than two vertices
    pub fn new(
        polyline: LineString<f64>,
        route_id: impl Into<String>,
        origins: impl IntoIterator<Item = Provenance>,
    ) -> Result<Self> {
        if polyline.0.len() < 2 {
            return Err(LrsError::InvalidGeometry(format!(
                "route part needs at least 2 vertices, got {}",
                polyline.0.len()
            )));
        }
        let bounding_box = polyline.bounding_rect().ok_or_else(|| {
            LrsError::InvalidGeometry("route part without bounding box".to_string())
        })?;
        let length = utils::polyline_length(&polyline);

        Ok(Self {
            polyline,
            route_id: route_id.into(),
            origins: origins.into_iter().collect(),
            milestones: Vec::new(),
            good_milestones: Vec::new(),
            records: Vec::new(),
            errors: Vec::new(),
            calibrated: false,
            length,
            bounding_box,
        })
    }

    #[inline]
    pub fn polyline(&self) -> &LineString<f64> {
        &self.polyline
    }

    #[inline]
    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    #[inline]
    pub fn origins(&self) -> &[Provenance] {
        &self.origins
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    #[inline]
    pub fn bounding_box(&self) -> Rect<f64> {
        self.bounding_box
    }

    /// All milestones snapped onto this part, including dropped ones
    #[inline]
    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    /// Milestones kept by calibration, in increasing measure order
    pub fn good_milestones(&self) -> impl Iterator<Item = &Milestone> + '_ {
        self.good_milestones.iter().map(|&i| &self.milestones[i])
    }

    #[inline]
    pub fn records(&self) -> &[CalibrationRecord] {
        &self.records
    }

    #[inline]
    pub fn errors(&self) -> &[CalibrationError] {
        &self.errors
    }

    #[inline]
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Project a point onto the part polyline
    pub fn locate(&self, point: Coord<f64>) -> Option<LineLocation> {
        utils::nearest_location(&self.polyline, point)
    }

    /// Add a milestone whose `part_distance` is already computed
    pub fn add_milestone(&mut self, milestone: Milestone) {
        if self.calibrated {
            tracing::warn!(
                "Ignoring milestone {} added to calibrated part of route {}",
                milestone.measure,
                self.route_id
            );
            return;
        }
        self.milestones.push(milestone);
    }

    /// Calibrate the part, filling records and errors
    ///
    /// Calibration runs once; later calls do nothing.
    pub fn calibrate(&mut self) {
        #[cfg(feature = "profiling")]
        profiling::scope!("part::calibrate");

        if self.calibrated {
            tracing::warn!("Route {} part is already calibrated", self.route_id);
            return;
        }
        self.calibrated = true;

        if self.milestones.len() < 2 {
            self.errors.push(self.part_error(ErrorKind::NotEnoughMilestones));
            return;
        }

        let mut order: Vec<usize> = (0..self.milestones.len()).collect();
        order.sort_by(|&a, &b| {
            let (a, b) = (&self.milestones[a], &self.milestones[b]);
            a.part_distance
                .total_cmp(&b.part_distance)
                .then(a.measure.total_cmp(&b.measure))
        });

        let (up, down) = self.direction_votes(&order);
        if up == down {
            self.errors.push(self.part_error(ErrorKind::DirectionGuess));
            return;
        }
        if down > up {
            tracing::debug!("Reversing part of route {} ({up} up, {down} down)", self.route_id);
            self.reverse(&mut order);
        }

        self.resolve_conflicts(&mut order);

        self.records = order
            .windows(2)
            .map(|w| {
                let (m1, m2) = (&self.milestones[w[0]], &self.milestones[w[1]]);
                CalibrationRecord::new(m1.measure, m2.measure, m1.part_distance, m2.part_distance)
            })
            .collect();
        self.good_milestones = order;

        tracing::debug!(
            "Route {} part calibrated: {} milestones, {} records, {} errors",
            self.route_id,
            self.milestones.len(),
            self.records.len(),
            self.errors.len()
        );
    }

    /// Count increasing and decreasing measure steps between neighbours
    fn direction_votes(&self, order: &[usize]) -> (usize, usize) {
        let mut up = 0;
        let mut down = 0;
        for w in order.windows(2) {
            let (m1, m2) = (self.milestones[w[0]].measure, self.milestones[w[1]].measure);
            if m1 < m2 {
                up += 1;
            } else if m1 > m2 {
                down += 1;
            }
        }
        (up, down)
    }

    /// Reverse the polyline and the milestone order, recomputing part distances
    fn reverse(&mut self, order: &mut [usize]) {
        self.polyline.0.reverse();
        order.reverse();
        for milestone in &mut self.milestones {
            milestone.part_distance = (self.length - milestone.part_distance).max(0.0);
        }
    }

    /// Drop lowest scoring milestones until every pair is in order
    fn resolve_conflicts(&mut self, order: &mut Vec<usize>) {
        loop {
            let measures: Vec<f64> = order.iter().map(|&i| self.milestones[i].measure).collect();
            let Some(scores) = consistency_scores(&measures) else {
                break;
            };
            let Some(&min_score) = scores.iter().min() else {
                break;
            };

            // Errors of one round are reported from the far end first
            let mut kept = Vec::with_capacity(order.len());
            for (&index, &score) in order.iter().zip(&scores).rev() {
                if score == min_score {
                    let milestone = &self.milestones[index];
                    tracing::debug!(
                        "Dropping milestone {} of route {} (score {score})",
                        milestone.measure,
                        self.route_id
                    );
                    self.errors.push(
                        CalibrationError::new(ErrorKind::WrongMeasure, Point::from(milestone.point))
                            .with_route(self.route_id.clone())
                            .with_measure(milestone.measure)
                            .with_origins([milestone.origin]),
                    );
                } else {
                    kept.push(index);
                }
            }
            kept.reverse();
            *order = kept;
        }
    }

    fn part_error(&self, kind: ErrorKind) -> CalibrationError {
        CalibrationError::new(kind, self.polyline.clone())
            .with_route(self.route_id.clone())
            .with_origins(self.origins.iter().copied())
    }

    /// First record whose open measure interval contains `measure`
    pub fn record_containing(&self, measure: f64) -> Option<&CalibrationRecord> {
        self.records.iter().find(|r| r.measure_within(measure))
    }

    /// Distance along the polyline corresponding to `measure`
    pub fn distance_at_measure(&self, measure: f64) -> Option<f64> {
        self.record_containing(measure).map(|r| r.interpolate(measure))
    }

    /// Measure corresponding to a distance along the polyline
    pub fn measure_at_distance(&self, distance: f64) -> Option<f64> {
        self.records
            .iter()
            .find(|r| r.distance_within(distance))
            .map(|r| r.measure_at(distance))
    }

    /// Point on the polyline at `measure`
    pub fn point_at_measure(&self, measure: f64) -> Result<Coord<f64>> {
        self.distance_at_measure(measure)
            .and_then(|d| utils::point_along_polyline(&self.polyline, d))
            .ok_or_else(|| self.not_available(measure))
    }

    /// Geometry of the polyline between two measures
    pub fn range_geometry(&self, measure_from: f64, measure_to: f64) -> Result<LineString<f64>> {
        let from = self
            .distance_at_measure(measure_from)
            .ok_or_else(|| self.not_available(measure_from))?;
        let to = self
            .distance_at_measure(measure_to)
            .ok_or_else(|| self.not_available(measure_to))?;
        utils::sub_polyline(&self.polyline, from.min(to), from.max(to))
    }

    /// Geometry of the polyline covered by a record
    pub fn segment_geometry(&self, record: &CalibrationRecord) -> Result<LineString<f64>> {
        utils::sub_polyline(&self.polyline, record.dist_from, record.dist_to)
    }

    /// Geometries of all records
    ///
    /// Records without length (two milestones snapped to the same location) are skipped.
    pub fn segments(&self) -> Vec<Segment> {
        self.records
            .iter()
            .filter_map(|record| match self.segment_geometry(record) {
                Ok(geometry) => Some(Segment {
                    route_id: self.route_id.clone(),
                    record: *record,
                    geometry,
                }),
                Err(err) => {
                    tracing::warn!("Skipping segment of route {}: {err}", self.route_id);
                    None
                }
            })
            .collect()
    }

    fn not_available(&self, measure: f64) -> LrsError {
        LrsError::MeasureNotAvailable {
            route_id: self.route_id.clone(),
            measure,
        }
    }
}

/// Score every milestone by how well its measure agrees with its position
///
/// `measures` must be in position order. Returns `None` when every pair is in order.
pub(crate) fn consistency_scores(measures: &[f64]) -> Option<Vec<i64>> {
    let mut consistent = true;
    let scores = measures
        .iter()
        .enumerate()
        .map(|(i, &mi)| {
            let mut score = 0i64;
            for (j, &mj) in measures.iter().enumerate() {
                if i == j {
                    continue;
                }
                if (i < j && mi < mj) || (i > j && mi > mj) {
                    score += 1;
                } else {
                    // Includes equal measures
                    score -= 1;
                    consistent = false;
                }
            }
            score
        })
        .collect();

    (!consistent).then_some(scores)
}
