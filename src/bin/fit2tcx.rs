use std::path::PathBuf;
use std::process::ExitCode;

use chrono::FixedOffset;
use clap::Parser;
use rustytcx::processing::types::parse_utc_offset;
use rustytcx::processing::{ConversionOptions, TimestampZone, convert_fit_bytes};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "fit2tcx",
    version,
    about = "Convert a FIT activity to TCX, optionally recalculating distance and speed from GPS or calibrating the footpod"
)]
struct Cli {
    /// FIT file to read
    #[arg(value_name = "FIT_FILE")]
    source: PathBuf,

    /// TCX file to write
    #[arg(value_name = "TCX_FILE")]
    target: PathBuf,

    /// FIT timestamps are local time; detect the zone from the first position
    #[arg(short = 't', long = "local-timezone")]
    local_timezone: bool,

    /// FIT timestamps are local time at this UTC offset (e.g. +02:00)
    #[arg(long = "timezone-offset", value_name = "±HH:MM", value_parser = offset_arg, allow_hyphen_values = true)]
    timezone_offset: Option<FixedOffset>,

    /// Recalculate distance from GPS data
    #[arg(short = 'd', long = "recalculate-distance-from-gps")]
    recalculate_distance: bool,

    /// Recalculate speed from GPS data
    #[arg(short = 's', long = "recalculate-speed-from-gps")]
    recalculate_speed: bool,

    /// Use GPS (or known lap distances) to calibrate footpod distance and speed
    #[arg(short = 'c', long = "calibrate-footpod")]
    calibrate: bool,

    /// Calibrate each lap separately instead of the whole activity
    #[arg(short = 'p', long = "per-lap-calibration")]
    per_lap_calibration: bool,

    /// Known distance of the next lap in meters; repeat for later laps
    #[arg(short = 'l', long = "manual-lap-distance", value_name = "METERS")]
    manual_lap_distances: Vec<f64>,

    /// Footpod calibration factor currently set on the watch, in percent
    #[arg(short = 'f', long = "calibration-factor", value_name = "PERCENT")]
    calibration_factor: Option<f64>,
}

fn offset_arg(value: &str) -> Result<FixedOffset, String> {
    parse_utc_offset(value).map_err(|err| err.to_string())
}

impl Cli {
    fn options(&self) -> ConversionOptions {
        let timezone = match (self.timezone_offset, self.local_timezone) {
            (Some(offset), _) => TimestampZone::Offset(offset),
            (None, true) => TimestampZone::LocalAuto,
            (None, false) => TimestampZone::Utc,
        };

        ConversionOptions {
            recalculate_distance: self.recalculate_distance,
            recalculate_speed: self.recalculate_speed,
            calibrate: self.calibrate,
            per_lap_calibration: self.per_lap_calibration,
            manual_lap_distances: self.manual_lap_distances.clone(),
            calibration_factor: self.calibration_factor,
            timezone,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fit2tcx=info,rustytcx=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let bytes = match std::fs::read(&cli.source) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("Failed to read {}: {err}", cli.source.display());
            return ExitCode::FAILURE;
        }
    };

    let converted = match convert_fit_bytes(&bytes, &cli.options()) {
        Ok(converted) => converted,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = std::fs::write(&cli.target, &converted.tcx_bytes) {
        eprintln!("Failed to write {}: {err}", cli.target.display());
        return ExitCode::FAILURE;
    }
    tracing::info!(target_file = %cli.target.display(), "wrote TCX document");

    println!("{}", converted.report.notes);
    ExitCode::SUCCESS
}
