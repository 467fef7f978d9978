//! GPS versus footpod comparison for each lap and the whole activity.
//!
//! The report is always produced, whether or not recalculation or calibration
//! was requested. It is descriptive only and never feeds back into the
//! emitted streams.

use crate::processing::calibrate::{
    CalibrationOutcome, CalibrationStatus, ReferenceCandidates,
};
use crate::processing::overrides::LapOverrides;
use crate::processing::track::{Activity, Lap};
use crate::processing::types::ConversionOptions;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DistanceComparison {
    pub gps_distance: Option<f64>,
    /// Footpod distance as recorded.
    pub footpod_distance: Option<f64>,
    /// Footpod distance with the existing calibration factor divided out.
    pub normalized_footpod_distance: Option<f64>,
    /// Normalized footpod distance over GPS distance, in percent.
    pub accuracy_percent: Option<f64>,
}

impl DistanceComparison {
    pub fn new(gps_distance: Option<f64>, footpod_distance: Option<f64>, existing_factor: f64) -> Self {
        let normalized_footpod_distance =
            footpod_distance.map(|distance| distance / (existing_factor / 100.0));
        let accuracy_percent = match (normalized_footpod_distance, gps_distance) {
            (Some(footpod), Some(gps)) if gps > 0.0 => Some(footpod / gps * 100.0),
            _ => None,
        };

        Self {
            gps_distance,
            footpod_distance,
            normalized_footpod_distance,
            accuracy_percent,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LapReport {
    pub lap_number: usize,
    pub comparison: DistanceComparison,
    pub manual_distance: Option<f64>,
    /// Calibration this lap would get on its own.
    pub calibration: CalibrationOutcome,
    /// Lap distance written to the output.
    pub distance_used: Option<f64>,
    pub elapsed_seconds: f64,
    pub notes: String,
}

#[derive(Debug, Clone)]
pub struct ActivityReport {
    pub lap_count: usize,
    pub existing_factor: f64,
    pub comparison: DistanceComparison,
    /// Calibration the activity would get as a single unit.
    pub calibration: CalibrationOutcome,
    pub distance_used: Option<f64>,
    pub elapsed_seconds: f64,
    pub method: Option<String>,
    pub laps: Vec<LapReport>,
    pub notes: String,
}

pub fn build_report(
    activity: &Activity,
    options: &ConversionOptions,
    existing_factor: f64,
    overrides: &[LapOverrides],
) -> ActivityReport {
    let laps: Vec<LapReport> = activity
        .laps()
        .iter()
        .enumerate()
        .map(|(index, lap)| {
            let distance_used = overrides.get(index).and_then(|lap| lap.distance_meters);
            lap_report(index + 1, lap, existing_factor, distance_used)
        })
        .collect();

    let comparison = DistanceComparison::new(
        activity.reference_gps_distance(),
        activity.footpod_distance(),
        existing_factor,
    );
    let calibration = CalibrationOutcome::compute(
        ReferenceCandidates::for_activity(activity),
        activity.footpod_distance(),
        existing_factor,
    );

    let emitted_total = laps
        .iter()
        .filter_map(|lap| lap.distance_used)
        .fold(None, |total: Option<f64>, distance| Some(total.unwrap_or(0.0) + distance));
    let distance_used = if options.recalculate_distance || options.calibrate {
        emitted_total
    } else {
        activity
            .session()
            .and_then(|session| session.total_distance)
            .or(emitted_total)
    };

    let elapsed_seconds = activity.elapsed_seconds();
    let method = options.method_description();

    let mut notes = format!(
        "{} laps: {} in {}",
        laps.len(),
        format_km(distance_used),
        format_elapsed(elapsed_seconds)
    );
    if let Some(method) = &method {
        notes.push(' ');
        notes.push_str(method);
    }
    notes.push('\n');
    notes.push_str(&comparison_line(&comparison));
    notes.push('\n');
    notes.push_str(&factor_line(existing_factor, &calibration, "activity", ""));

    ActivityReport {
        lap_count: laps.len(),
        existing_factor,
        comparison,
        calibration,
        distance_used,
        elapsed_seconds,
        method,
        laps,
        notes,
    }
}

fn lap_report(
    lap_number: usize,
    lap: &Lap,
    existing_factor: f64,
    distance_used: Option<f64>,
) -> LapReport {
    let comparison = DistanceComparison::new(lap.gps_distance(), lap.footpod_distance(), existing_factor);
    let calibration = CalibrationOutcome::compute(
        ReferenceCandidates::for_lap(lap),
        lap.footpod_distance(),
        existing_factor,
    );
    let elapsed_seconds = lap.elapsed_seconds();

    let mut notes = format!(
        "Lap {lap_number}: {} in {}\n",
        format_km(distance_used),
        format_elapsed(elapsed_seconds)
    );
    match lap.manual_distance() {
        Some(known) => {
            notes.push_str(&format!(
                "Distance in FIT file: {}; calculated via GPS: {}; known distance: {} \
                 (FIT accuracy: {}; GPS accuracy: {})",
                format_km(comparison.footpod_distance),
                format_km(comparison.gps_distance),
                format_km(Some(known)),
                format_percent(comparison.normalized_footpod_distance.map(|footpod| footpod / known * 100.0)),
                format_percent(comparison.gps_distance.map(|gps| gps / known * 100.0)),
            ));
        }
        None => notes.push_str(&comparison_line(&comparison)),
    }
    notes.push('\n');
    notes.push_str(&factor_line(existing_factor, &calibration, "lap", " for this lap"));

    LapReport {
        lap_number,
        comparison,
        manual_distance: lap.manual_distance(),
        calibration,
        distance_used,
        elapsed_seconds,
        notes,
    }
}

fn comparison_line(comparison: &DistanceComparison) -> String {
    format!(
        "Distance in FIT file: {}; calculated via GPS: {} (accuracy: {})",
        format_km(comparison.footpod_distance),
        format_km(comparison.gps_distance),
        format_percent(comparison.accuracy_percent)
    )
}

fn factor_line(existing_factor: f64, outcome: &CalibrationOutcome, unit: &str, suffix: &str) -> String {
    let setting = format!("Footpod calibration factor setting: {existing_factor:.1}%");
    match (outcome.status, outcome.reference) {
        (CalibrationStatus::Calibrated, Some(reference)) => format!(
            "{setting}; new factor based on {}{suffix}: {:.1}%",
            reference.source.describe(),
            outcome.factor * 100.0
        ),
        (CalibrationStatus::Uncalibrated(reason), _) => {
            format!("{setting}; {unit} left uncalibrated ({})", reason.describe())
        }
        (CalibrationStatus::Calibrated, None) => setting,
    }
}

pub fn format_km(meters: Option<f64>) -> String {
    match meters {
        Some(meters) => format!("{:.3} km", meters / 1000.0),
        None => "unavailable".to_string(),
    }
}

pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(value) if value.is_finite() => format!("{value:.1}%"),
        _ => "unavailable".to_string(),
    }
}

/// `H:MM:SS`, truncated to whole seconds.
pub fn format_elapsed(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
