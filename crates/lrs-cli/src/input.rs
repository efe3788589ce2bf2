//! Feature file reading

use crate::CliError;
use lrs_lib::{LineFeature, PointFeature};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Feature source read from a JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureFile {
    #[serde(default)]
    pub lines: Vec<LineFeature>,
    #[serde(default)]
    pub points: Vec<PointFeature>,
}

impl FeatureFile {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let features: FeatureFile = serde_json::from_reader(reader)?;
        tracing::info!(
            "Loaded {} lines and {} points from {}",
            features.lines.len(),
            features.points.len(),
            path.display()
        );
        Ok(features)
    }
}
