//! Lrs - Top-level registry for routes, milestones, and queries
//!
//! This module provides the high-level API: it ingests all line features into routes,
//! snaps milestone features onto route parts, calibrates every part and answers
//! measure and geometry queries.

use crate::{
    CalibrationError, ErrorKind, FeatureSink, LineFeature, LrsError, Milestone, PointFeature,
    Provenance, Result, Route, Segment, utils,
};

use geo::{LineString, Point};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for building the LRS
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Maximum distance between a milestone and a route part, in working CRS units.
    /// Default: 10.0
    pub threshold: f64,
    /// Working coordinate system of all input features. Features must already be in
    /// this CRS; `None` means the native CRS of the line features.
    pub crs: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: 10.0,
            crs: None,
        }
    }
}

/// Information about the built LRS
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LrsInfo {
    pub route_count: usize,
    pub part_count: usize,
    /// Milestones assigned to parts
    pub milestone_count: usize,
    pub record_count: usize,
    pub error_count: usize,
}

/// Registry of all routes with their calibration
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Lrs {
    config: Config,
    /// Routes by route id
    routes: BTreeMap<String, Route>,
    /// Errors of features that could not be assigned to any route
    errors: Vec<CalibrationError>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Lrs {
    /// Build and calibrate the LRS from line and milestone features
    ///
    /// All lines are registered and chained into parts before any milestone is
    /// snapped. Data problems are collected, see [`Lrs::errors`].
    ///
    /// # Arguments
    /// * `config` - Snapping threshold and working CRS
    /// * `lines` - Route line features, grouped into routes by route id
    /// * `points` - Milestone features carrying a route id and a measure
    ///
    /// # Returns
    /// The calibrated registry; building never fails as a whole
    pub fn build(
        config: Config,
        lines: impl IntoIterator<Item = LineFeature>,
        points: impl IntoIterator<Item = PointFeature>,
    ) -> Self {
        #[cfg(feature = "profiling")]
        profiling::scope!("lrs::build");

        let mut lrs = Self {
            config,
            routes: BTreeMap::new(),
            errors: Vec::new(),
        };
        lrs.register_lines(lines);
        lrs.register_points(points);
        lrs.calibrate();

        let info = lrs.info();
        tracing::info!(
            "LRS built: {} routes, {} parts, {} milestones, {} records, {} errors",
            info.route_count,
            info.part_count,
            info.milestone_count,
            info.record_count,
            info.error_count
        );
        lrs
    }

    fn register_lines(&mut self, lines: impl IntoIterator<Item = LineFeature>) {
        for feature in lines {
            let Some(route_id) = feature.route_id else {
                tracing::debug!("Line {} has no route id", feature.id);
                let (id, count) = (feature.id, feature.geometry.0.len());
                let origins = (0..count).map(move |i| Provenance::new(id, i, count));
                self.errors.push(
                    CalibrationError::new(ErrorKind::NoRouteId, feature.geometry)
                        .with_origins(origins),
                );
                continue;
            };
            tracing::debug!("Line {} route {route_id}", feature.id);

            let part_count = feature.geometry.0.len();
            let route = self
                .routes
                .entry(route_id.clone())
                .or_insert_with(|| Route::new(route_id));
            for (part_index, polyline) in feature.geometry.0.into_iter().enumerate() {
                route.add_line(polyline, Provenance::new(feature.id, part_index, part_count));
            }
        }

        for route in self.routes.values_mut() {
            route.build_parts();
        }
    }

    fn register_points(&mut self, points: impl IntoIterator<Item = PointFeature>) {
        let threshold = self.config.threshold;

        for feature in points {
            let part_count = feature.geometry.0.len();
            let origin = |part_index| Provenance::new(feature.id, part_index, part_count);

            let Some(route_id) = feature.route_id.as_deref() else {
                self.errors.push(
                    CalibrationError::new(ErrorKind::NoRouteId, feature.geometry.clone())
                        .with_origins((0..part_count).map(origin)),
                );
                continue;
            };
            let Some(measure) = feature.measure.filter(|m| m.is_finite()) else {
                self.errors.push(
                    CalibrationError::new(ErrorKind::NoMeasure, feature.geometry.clone())
                        .with_route(route_id)
                        .with_origins((0..part_count).map(origin)),
                );
                continue;
            };

            for (part_index, point) in feature.geometry.0.iter().enumerate() {
                let snapped = self.routes.get_mut(route_id).and_then(|route| {
                    let (index, location) = route.nearest_part(point.0, threshold)?;
                    route.part_mut(index).map(|part| (part, location))
                });

                match snapped {
                    Some((part, location)) => {
                        let part_distance = utils::measure_along_polyline(
                            part.polyline(),
                            location.segment_index,
                            location.point,
                        );
                        part.add_milestone(Milestone::new(
                            point.0,
                            measure,
                            part_distance,
                            origin(part_index),
                        ));
                    }
                    None => {
                        tracing::debug!(
                            "Milestone {} of route {route_id} not within {threshold} of any part",
                            feature.id
                        );
                        self.errors.push(
                            CalibrationError::new(ErrorKind::UnassignedMilestone, *point)
                                .with_route(route_id)
                                .with_measure(measure)
                                .with_origins([origin(part_index)]),
                        );
                    }
                }
            }
        }
    }

    fn calibrate(&mut self) {
        self.routes
            .par_iter_mut()
            .for_each(|(_, route)| route.calibrate());
    }

    /// Get a reference to the configuration
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// All route ids in sorted order
    pub fn route_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.routes.keys().map(String::as_str)
    }

    #[inline]
    pub fn route(&self, route_id: &str) -> Option<&Route> {
        self.routes.get(route_id)
    }

    fn get_route(&self, route_id: &str) -> Result<&Route> {
        self.routes
            .get(route_id)
            .ok_or_else(|| LrsError::UnknownRoute(route_id.to_string()))
    }

    /// All collected errors: unassigned features first, then per route
    pub fn errors(&self) -> impl Iterator<Item = &CalibrationError> + '_ {
        self.errors
            .iter()
            .chain(self.routes.values().flat_map(|route| route.errors()))
    }

    /// Point on route `route_id` at `measure`
    pub fn point_at_measure(&self, route_id: &str, measure: f64) -> Result<Point<f64>> {
        self.get_route(route_id)?
            .point_at_measure(measure)
            .map(Point::from)
            .ok_or_else(|| LrsError::MeasureNotAvailable {
                route_id: route_id.to_string(),
                measure,
            })
    }

    /// Geometry of route `route_id` between two measures
    ///
    /// # Arguments
    /// * `route_id` - Route to query
    /// * `measure_from` - Measure at one end of the range
    /// * `measure_to` - Measure at the other end; the order of the two does not matter
    ///
    /// # Returns
    /// The sub-polyline of the part holding both measures. Fails with `MeasureNotAvailable`
    /// when a measure is not referenced on the route, `MeasuresOnDifferentParts` when the
    /// measures are referenced on two different parts, and `EmptyRange` when both
    /// measures map to the same position.
    pub fn segment_geometry(
        &self,
        route_id: &str,
        measure_from: f64,
        measure_to: f64,
    ) -> Result<LineString<f64>> {
        self.get_route(route_id)?.range_geometry(measure_from, measure_to)
    }

    /// Measure of a point near route `route_id`
    pub fn measure_at_point(&self, route_id: &str, point: Point<f64>) -> Result<f64> {
        self.get_route(route_id)?
            .measure_at_point(point.0, self.config.threshold)
            .ok_or_else(|| LrsError::PointNotReferenced {
                route_id: route_id.to_string(),
            })
    }

    /// Geometries of all calibration records of all routes
    pub fn segments(&self) -> Vec<Segment> {
        self.routes.values().flat_map(|route| route.segments()).collect()
    }

    /// Write all segments and errors to a sink
    pub fn export(&self, sink: &mut impl FeatureSink) {
        for segment in self.segments() {
            sink.write_segment(&segment);
        }
        for error in self.errors() {
            sink.write_error(error);
        }
    }

    /// Get LRS information
    pub fn info(&self) -> LrsInfo {
        let parts = || self.routes.values().flat_map(|route| route.parts());
        LrsInfo {
            route_count: self.routes.len(),
            part_count: parts().count(),
            milestone_count: parts().map(|part| part.milestones().len()).sum(),
            record_count: parts().map(|part| part.records().len()).sum(),
            error_count: self.errors().count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySink;
    use geo::{Coord, MultiLineString, MultiPoint};

    fn create_test_lines() -> Vec<LineFeature> {
        vec![
            // Route A: two connected lines, 0..20 along x
            LineFeature::single(1, "A", LineString::from(vec![(0.0, 0.0), (10.0, 0.0)])),
            LineFeature::single(2, "A", LineString::from(vec![(10.0, 0.0), (20.0, 0.0)])),
            // Route B: digitized against its measure direction
            LineFeature::single(3, "B", LineString::from(vec![(0.0, 50.0), (0.0, 100.0)])),
        ]
    }

    fn create_test_points() -> Vec<PointFeature> {
        vec![
            PointFeature::single(10, "A", 0.0, Point::new(0.0, 1.0)),
            PointFeature::single(11, "A", 1.0, Point::new(10.0, -1.0)),
            PointFeature::single(12, "A", 2.0, Point::new(20.0, 0.5)),
            PointFeature::single(20, "B", 5.0, Point::new(1.0, 50.0)),
            PointFeature::single(21, "B", 0.0, Point::new(-1.0, 100.0)),
        ]
    }

    fn create_test_lrs() -> Lrs {
        Lrs::build(Config::default(), create_test_lines(), create_test_points())
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.threshold, 10.0);
        assert!(config.crs.is_none());
    }

    #[test]
    fn test_build() {
        let lrs = create_test_lrs();
        let info = lrs.info();

        assert_eq!(info.route_count, 2);
        assert_eq!(info.part_count, 2);
        assert_eq!(info.milestone_count, 5);
        assert_eq!(info.record_count, 3);
        assert_eq!(info.error_count, 0);
        assert_eq!(lrs.route_ids().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_point_at_measure() {
        let lrs = create_test_lrs();

        let point = lrs.point_at_measure("A", 1.5).unwrap();
        assert!((point.x() - 15.0).abs() < 1e-9);
        assert!(point.y().abs() < 1e-9);

        // Route B is reversed: measure 0 at y=100, measure 5 at y=50
        let point = lrs.point_at_measure("B", 1.0).unwrap();
        assert!((point.y() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_point_at_measure_not_available() {
        let lrs = create_test_lrs();

        assert!(matches!(
            lrs.point_at_measure("A", 1.0),
            Err(LrsError::MeasureNotAvailable { .. })
        ));
        assert!(matches!(
            lrs.point_at_measure("A", 7.0),
            Err(LrsError::MeasureNotAvailable { .. })
        ));
        assert!(matches!(
            lrs.point_at_measure("Z", 1.0),
            Err(LrsError::UnknownRoute(_))
        ));
    }

    #[test]
    fn test_segment_geometry() {
        let lrs = create_test_lrs();

        let geometry = lrs.segment_geometry("A", 0.5, 1.5).unwrap();
        assert_eq!(
            geometry.0,
            vec![
                Coord { x: 5.0, y: 0.0 },
                Coord { x: 10.0, y: 0.0 },
                Coord { x: 15.0, y: 0.0 },
            ]
        );

        match lrs.segment_geometry("A", 0.5, 3.0) {
            Err(LrsError::MeasureNotAvailable { measure, .. }) => assert_eq!(measure, 3.0),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_segment_geometry_empty_range() {
        let lrs = create_test_lrs();

        // Measure 0.5 is available, but the range has no length
        assert!(lrs.point_at_measure("A", 0.5).is_ok());
        assert!(matches!(
            lrs.segment_geometry("A", 0.5, 0.5),
            Err(LrsError::EmptyRange { .. })
        ));
    }

    #[test]
    fn test_segment_geometry_across_parts() {
        let lines = vec![
            LineFeature::single(1, "A", LineString::from(vec![(0.0, 0.0), (10.0, 0.0)])),
            LineFeature::single(2, "A", LineString::from(vec![(100.0, 0.0), (110.0, 0.0)])),
        ];
        let points = vec![
            PointFeature::single(10, "A", 0.0, Point::new(0.0, 0.0)),
            PointFeature::single(11, "A", 1.0, Point::new(10.0, 0.0)),
            PointFeature::single(12, "A", 2.0, Point::new(100.0, 0.0)),
            PointFeature::single(13, "A", 3.0, Point::new(110.0, 0.0)),
        ];
        let lrs = Lrs::build(Config::default(), lines, points);
        assert_eq!(lrs.route("A").unwrap().parts().len(), 2);

        assert!(lrs.point_at_measure("A", 0.5).is_ok());
        assert!(lrs.point_at_measure("A", 2.5).is_ok());
        match lrs.segment_geometry("A", 0.5, 2.5) {
            Err(LrsError::MeasuresOnDifferentParts {
                measure_from,
                measure_to,
                ..
            }) => assert_eq!((measure_from, measure_to), (0.5, 2.5)),
            other => panic!("unexpected result: {other:?}"),
        }

        // A measure missing everywhere still wins over the part mismatch
        match lrs.segment_geometry("A", 0.5, 5.0) {
            Err(LrsError::MeasureNotAvailable { measure, .. }) => assert_eq!(measure, 5.0),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_measure_at_point() {
        let lrs = create_test_lrs();

        let measure = lrs.measure_at_point("A", Point::new(5.0, 3.0)).unwrap();
        assert!((measure - 0.5).abs() < 1e-9);

        let measure = lrs.measure_at_point("B", Point::new(2.0, 60.0)).unwrap();
        assert!((measure - 4.0).abs() < 1e-9);

        assert!(matches!(
            lrs.measure_at_point("A", Point::new(5.0, 30.0)),
            Err(LrsError::PointNotReferenced { .. })
        ));
    }

    #[test]
    fn test_unassigned_and_invalid_milestones() {
        let mut points = create_test_points();
        // Too far from route A
        points.push(PointFeature::single(30, "A", 1.5, Point::new(15.0, 40.0)));
        // Unknown route
        points.push(PointFeature::single(31, "Q", 1.0, Point::new(0.0, 0.0)));
        // No measure
        points.push(PointFeature {
            id: 32,
            route_id: Some("A".to_string()),
            measure: None,
            geometry: MultiPoint::new(vec![Point::new(5.0, 0.0)]),
        });
        // No route id
        points.push(PointFeature {
            id: 33,
            route_id: None,
            measure: Some(1.0),
            geometry: MultiPoint::new(vec![Point::new(5.0, 0.0)]),
        });

        let lrs = Lrs::build(Config::default(), create_test_lines(), points);
        let kinds: Vec<ErrorKind> = lrs.errors().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::UnassignedMilestone,
                ErrorKind::UnassignedMilestone,
                ErrorKind::NoMeasure,
                ErrorKind::NoRouteId,
            ]
        );
        // Calibration is unaffected
        assert_eq!(lrs.info().record_count, 3);
    }

    #[test]
    fn test_threshold_from_config() {
        let config = Config {
            threshold: 0.5,
            crs: Some("EPSG:3857".to_string()),
        };
        let lrs = Lrs::build(config, create_test_lines(), create_test_points());

        // Every milestone of the test set is at least 0.5 away from its line
        assert_eq!(lrs.info().milestone_count, 1);
        assert_eq!(lrs.config().crs.as_deref(), Some("EPSG:3857"));
    }

    #[test]
    fn test_multipart_features() {
        let lines = vec![LineFeature {
            id: 1,
            route_id: Some("M".to_string()),
            geometry: MultiLineString::new(vec![
                LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]),
                LineString::from(vec![(100.0, 0.0), (110.0, 0.0)]),
            ]),
        }];
        let points = vec![PointFeature {
            id: 2,
            route_id: Some("M".to_string()),
            measure: Some(1.0),
            geometry: MultiPoint::new(vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)]),
        }];
        let lrs = Lrs::build(Config::default(), lines, points);

        let route = lrs.route("M").unwrap();
        assert_eq!(route.parts().len(), 2);
        assert_eq!(route.parts()[1].origins(), &[Provenance::new(1, 1, 2)]);

        // One milestone per part: both parts fail
        let errors: Vec<&CalibrationError> = lrs.errors().collect();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind == ErrorKind::NotEnoughMilestones));
    }

    #[test]
    fn test_export() {
        let lrs = create_test_lrs();
        let mut sink = MemorySink::default();
        lrs.export(&mut sink);

        assert_eq!(sink.segments.len(), 3);
        assert!(sink.errors.is_empty());
        assert!(sink.segments.iter().all(|s| s.geometry.0.len() >= 2));
        assert_eq!(sink.segments[0].route_id, "A");
    }
}
