mod input;
mod output;
mod settings;

use clap::Parser;
use input::FeatureFile;
use lrs_lib::{Lrs, LrsError};
use output::JsonSink;
use settings::{Command, Settings};
use std::process::ExitCode;

/// Error types for the command-line front end
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Lrs(#[from] LrsError),
}

fn main() -> ExitCode {
    // Setup logging
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let settings = Settings::parse();
    match run(settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: Settings) -> Result<(), CliError> {
    let features = FeatureFile::load(&settings.input)?;
    let lrs = Lrs::build(settings.config(), features.lines, features.points);

    match settings.command {
        Command::Calibrate { output } => {
            let mut sink = JsonSink::new(lrs.config().crs.clone());
            lrs.export(&mut sink);
            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)?;
                    sink.write_to(std::io::BufWriter::new(file))?;
                    tracing::info!(
                        "Wrote {} segments and {} errors to {}",
                        sink.segments.len(),
                        sink.errors.len(),
                        path.display()
                    );
                }
                None => {
                    sink.write_to(std::io::stdout().lock())?;
                    println!();
                }
            }
        }
        Command::Locate { route, measure, to } => {
            let geometry: geo::Geometry<f64> = match to {
                Some(to) => lrs.segment_geometry(&route, measure, to)?.into(),
                None => lrs.point_at_measure(&route, measure)?.into(),
            };
            println!("{}", serde_json::to_string(&geometry)?);
        }
        Command::Errors => {
            for error in lrs.errors() {
                println!("{error}");
            }
        }
    }

    Ok(())
}
