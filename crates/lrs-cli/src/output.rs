//! JSON feature sink

use lrs_lib::{CalibrationError, FeatureSink, Segment};
use serde::Serialize;

/// Error record as written to the output
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    #[serde(flatten)]
    pub error: CalibrationError,
}

/// Calibration result collected for JSON output
#[derive(Debug, Clone, Default, Serialize)]
pub struct JsonSink {
    pub crs: Option<String>,
    pub segments: Vec<Segment>,
    pub errors: Vec<ErrorRecord>,
}

impl JsonSink {
    pub fn new(crs: Option<String>) -> Self {
        Self {
            crs,
            ..Self::default()
        }
    }

    pub fn write_to(&self, writer: impl std::io::Write) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, self)
    }
}

impl FeatureSink for JsonSink {
    fn write_segment(&mut self, segment: &Segment) {
        self.segments.push(segment.clone());
    }

    fn write_error(&mut self, error: &CalibrationError) {
        self.errors.push(ErrorRecord {
            message: error.to_string(),
            error: error.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Point};
    use lrs_lib::{Config, LineFeature, Lrs, PointFeature};

    #[test]
    fn test_export_to_json() {
        let lines = vec![LineFeature::single(
            1,
            "R1",
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]),
        )];
        let points = vec![PointFeature::single(2, "R1", 1.0, Point::new(5.0, 0.0))];
        let lrs = Lrs::build(Config::default(), lines, points);

        let mut sink = JsonSink::new(Some("EPSG:3857".to_string()));
        lrs.export(&mut sink);
        assert!(sink.segments.is_empty());
        assert_eq!(sink.errors.len(), 1);

        let mut buffer = Vec::new();
        sink.write_to(&mut buffer).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["crs"], "EPSG:3857");
        assert_eq!(value["errors"][0]["kind"], "NotEnoughMilestones");
        assert_eq!(value["errors"][0]["route_id"], "R1");
        assert!(
            value["errors"][0]["message"]
                .as_str()
                .unwrap()
                .starts_with("Not enough milestones")
        );
    }
}
