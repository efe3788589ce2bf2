//! Calibration records and the segments materialized from them

use geo::LineString;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Linear mapping between a measure range and a distance range along a part
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationRecord {
    /// Measures from the milestone measure attribute
    pub measure_from: f64,
    pub measure_to: f64,
    /// Distances measured along the part polyline
    pub dist_from: f64,
    pub dist_to: f64,
}

impl CalibrationRecord {
    pub fn new(measure_from: f64, measure_to: f64, dist_from: f64, dist_to: f64) -> Self {
        Self {
            measure_from,
            measure_to,
            dist_from,
            dist_to,
        }
    }

    /// Whether `measure` lies in the open interval `(measure_from, measure_to)`
    #[inline]
    pub fn measure_within(&self, measure: f64) -> bool {
        self.measure_from < measure && measure < self.measure_to
    }

    /// Whether the measure ranges of two records at least partially overlap
    pub fn measure_overlaps(&self, other: &CalibrationRecord) -> bool {
        self.measure_within(other.measure_from)
            || self.measure_within(other.measure_to)
            || other.measure_within(self.measure_from)
            || other.measure_within(self.measure_to)
            || other.measure_within((self.measure_from + self.measure_to) / 2.0)
    }

    /// Distance along the part corresponding to `measure`
    #[inline]
    pub fn interpolate(&self, measure: f64) -> f64 {
        let k = (measure - self.measure_from) / (self.measure_to - self.measure_from);
        self.dist_from + k * (self.dist_to - self.dist_from)
    }

    /// Whether `distance` lies in the closed interval `[dist_from, dist_to]`
    #[inline]
    pub fn distance_within(&self, distance: f64) -> bool {
        self.dist_from <= distance && distance <= self.dist_to
    }

    /// Measure corresponding to a distance along the part (inverse of [`Self::interpolate`])
    ///
    /// A zero-length record maps every distance to its start measure.
    #[inline]
    pub fn measure_at(&self, distance: f64) -> f64 {
        let length = self.dist_to - self.dist_from;
        if length == 0.0 {
            return self.measure_from;
        }
        let k = (distance - self.dist_from) / length;
        self.measure_from + k * (self.measure_to - self.measure_from)
    }
}

/// Record geometry of a calibrated route part
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Segment {
    pub route_id: String,
    pub record: CalibrationRecord,
    pub geometry: LineString<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_within_is_open() {
        let record = CalibrationRecord::new(1.0, 2.0, 0.0, 100.0);
        assert!(record.measure_within(1.5));
        assert!(!record.measure_within(1.0));
        assert!(!record.measure_within(2.0));
        assert!(!record.measure_within(2.5));
    }

    #[test]
    fn test_interpolate() {
        let record = CalibrationRecord::new(2.0, 4.0, 10.0, 30.0);
        assert!((record.interpolate(3.0) - 20.0).abs() < 1e-12);
        assert!((record.interpolate(2.5) - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_measure_at_inverts_interpolate() {
        let record = CalibrationRecord::new(2.0, 4.0, 10.0, 30.0);
        let d = record.interpolate(3.3);
        assert!((record.measure_at(d) - 3.3).abs() < 1e-12);

        let flat = CalibrationRecord::new(2.0, 4.0, 10.0, 10.0);
        assert_eq!(flat.measure_at(10.0), 2.0);
    }

    #[test]
    fn test_measure_overlaps() {
        let a = CalibrationRecord::new(0.0, 2.0, 0.0, 1.0);
        assert!(a.measure_overlaps(&CalibrationRecord::new(1.0, 3.0, 0.0, 1.0)));
        assert!(a.measure_overlaps(&CalibrationRecord::new(0.0, 2.0, 5.0, 6.0)));
        assert!(a.measure_overlaps(&CalibrationRecord::new(-1.0, 5.0, 5.0, 6.0)));
        assert!(!a.measure_overlaps(&CalibrationRecord::new(2.0, 3.0, 0.0, 1.0)));
        assert!(!a.measure_overlaps(&CalibrationRecord::new(5.0, 6.0, 0.0, 1.0)));
    }
}
