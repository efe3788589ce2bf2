use clap::{Parser, Subcommand};
use lrs_lib::Config;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// LRS - Build and query a linear reference system calibrated from milestones
pub struct Settings {
    /// JSON file with `lines` and `points` features
    #[clap(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Maximum distance between a milestone and its route, in working CRS units
    #[clap(short, long, default_value = "10.0")]
    pub threshold: f64,

    /// Working CRS of the input features (informational, no reprojection is done)
    #[clap(long)]
    pub crs: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Calibrate all routes and write segments and errors as JSON
    Calibrate {
        /// Output file (stdout if not given)
        #[clap(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Locate a measure (or a measure range) on a route
    Locate {
        /// Route id
        #[clap(short, long)]
        route: String,

        /// Measure to locate
        #[clap(short, long, allow_hyphen_values = true)]
        measure: f64,

        /// End measure, locates the range geometry instead of a point
        #[clap(long, allow_hyphen_values = true)]
        to: Option<f64>,
    },
    /// Print all data errors, one per line
    Errors,
}

impl Settings {
    /// Build configuration from the command line
    pub fn config(&self) -> Config {
        Config {
            threshold: self.threshold,
            crs: self.crs.clone(),
        }
    }
}
