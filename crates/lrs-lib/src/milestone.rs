//! Milestones snapped onto a route part

use crate::Provenance;
use geo::Coord;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A point with a known measure, located on a route part
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Milestone {
    /// Source point as read from the feature (not snapped)
    pub point: Coord<f64>,
    /// Declared measure
    pub measure: f64,
    /// Distance of the snapped point along the part polyline
    pub part_distance: f64,
    /// Originating point feature and its sub-geometry
    pub origin: Provenance,
}

impl Milestone {
    pub fn new(point: Coord<f64>, measure: f64, part_distance: f64, origin: Provenance) -> Self {
        Self {
            point,
            measure,
            part_distance,
            origin,
        }
    }
}
