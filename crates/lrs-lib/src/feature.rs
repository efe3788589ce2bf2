//! Typed feature source and sink contracts

use crate::{CalibrationError, Segment};
use geo::{LineString, MultiLineString, MultiPoint, Point};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a source feature
pub type FeatureId = u64;

/// A route line feature, possibly made of several polylines
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineFeature {
    pub id: FeatureId,
    pub route_id: Option<String>,
    pub geometry: MultiLineString<f64>,
}

/// A milestone point feature, possibly made of several points
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointFeature {
    pub id: FeatureId,
    pub route_id: Option<String>,
    pub measure: Option<f64>,
    pub geometry: MultiPoint<f64>,
}

impl LineFeature {
    /// Create a feature with a single polyline
    pub fn single(id: FeatureId, route_id: impl Into<String>, line: LineString<f64>) -> Self {
        Self {
            id,
            route_id: Some(route_id.into()),
            geometry: MultiLineString::new(vec![line]),
        }
    }
}

impl PointFeature {
    /// Create a feature with a single point
    pub fn single(id: FeatureId, route_id: impl Into<String>, measure: f64, point: Point<f64>) -> Self {
        Self {
            id,
            route_id: Some(route_id.into()),
            measure: Some(measure),
            geometry: MultiPoint::new(vec![point]),
        }
    }
}

/// Receiver of computed segments and collected errors
pub trait FeatureSink {
    fn write_segment(&mut self, segment: &Segment);

    fn write_error(&mut self, error: &CalibrationError);
}

/// Sink keeping everything in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub segments: Vec<Segment>,
    pub errors: Vec<CalibrationError>,
}

impl FeatureSink for MemorySink {
    fn write_segment(&mut self, segment: &Segment) {
        self.segments.push(segment.clone());
    }

    fn write_error(&mut self, error: &CalibrationError) {
        self.errors.push(error.clone());
    }
}
