//! Calibration error records
//!
//! Data problems found while building the LRS are never fatal. Each one is collected
//! as a [`CalibrationError`] carrying a geometry for display and the provenance of the
//! features involved, so the host can show them to the user for correction.

use crate::FeatureId;
use geo::Geometry;
use smallvec::SmallVec;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Reference to the sub-geometry of a source feature (traceability only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Provenance {
    /// Id of the originating feature
    pub feature_id: FeatureId,
    /// Index of the sub-geometry inside a multi-part feature geometry
    pub part_index: usize,
    /// Number of sub-geometries of the feature geometry
    pub part_count: usize,
}

/// Provenance list, inline for the usual handful of entries
pub type Provenances = SmallVec<[Provenance; 2]>;

impl Provenance {
    pub fn new(feature_id: FeatureId, part_index: usize, part_count: usize) -> Self {
        Self {
            feature_id,
            part_index,
            part_count,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.part_count > 1 {
            write!(f, "{}[{}/{}]", self.feature_id, self.part_index + 1, self.part_count)
        } else {
            write!(f, "{}", self.feature_id)
        }
    }
}

/// Kind of a data problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ErrorKind {
    /// Route part with fewer than two milestones, left uncalibrated
    NotEnoughMilestones,
    /// Increasing and decreasing measure votes tie, part left uncalibrated
    DirectionGuess,
    /// Milestone dropped by conflict resolution
    WrongMeasure,
    /// Milestone not within the threshold of any part of its route
    UnassignedMilestone,
    /// Feature without a route id
    NoRouteId,
    /// Milestone feature without a usable measure
    NoMeasure,
    /// Line identical to another line of the same route
    DuplicateLine,
    /// More than two lines of a route meet in one node
    Fork,
    /// The same measure range is referenced on more than one part of a route
    DuplicateReferencing,
}

impl ErrorKind {
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::NotEnoughMilestones => "Not enough milestones",
            ErrorKind::DirectionGuess => "Cannot guess direction",
            ErrorKind::WrongMeasure => "Wrong measure",
            ErrorKind::UnassignedMilestone => "Milestone not assigned to any route part",
            ErrorKind::NoRouteId => "Missing route id",
            ErrorKind::NoMeasure => "Missing measure",
            ErrorKind::DuplicateLine => "Duplicate line",
            ErrorKind::Fork => "Fork",
            ErrorKind::DuplicateReferencing => "Duplicate referencing",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A collected data problem, with geometry for display
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationError {
    pub kind: ErrorKind,
    pub geometry: Geometry<f64>,
    pub route_id: Option<String>,
    pub measure: Option<f64>,
    pub origins: Provenances,
}

impl CalibrationError {
    pub fn new(kind: ErrorKind, geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            kind,
            geometry: geometry.into(),
            route_id: None,
            measure: None,
            origins: Provenances::new(),
        }
    }

    pub fn with_route(mut self, route_id: impl Into<String>) -> Self {
        self.route_id = Some(route_id.into());
        self
    }

    pub fn with_measure(mut self, measure: f64) -> Self {
        self.measure = Some(measure);
        self
    }

    pub fn with_origins(mut self, origins: impl IntoIterator<Item = Provenance>) -> Self {
        self.origins.extend(origins);
        self
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(route_id) = &self.route_id {
            write!(f, " (route {route_id}")?;
            if let Some(measure) = self.measure {
                write!(f, ", measure {measure}")?;
            }
            write!(f, ")")?;
        }
        if !self.origins.is_empty() {
            let origins: Vec<String> = self.origins.iter().map(|o| o.to_string()).collect();
            write!(f, " features: {}", origins.join(", "))?;
        }
        Ok(())
    }
}
