//! Selection of the distance and speed values written to the output.
//!
//! Original footpod values, calibrated values and GPS-derived values all live
//! side by side on the track model. The overrides computed here pick one per
//! trackpoint and per lap: GPS recalculation wins over calibration, which wins
//! over the recorded values.

use crate::processing::calibrate::{CalibrationMode, CalibrationOutcome};
use crate::processing::track::{Activity, Lap};
use crate::processing::types::ConversionOptions;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordOverrides {
    pub distance: Option<f64>,
    pub speed: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LapOverrides {
    pub distance_meters: Option<f64>,
    pub avg_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub records: Vec<RecordOverrides>,
}

pub fn compute_lap_overrides(activity: &Activity, options: &ConversionOptions) -> Vec<LapOverrides> {
    let calibration = activity.calibration();
    let mut gps_offset = 0.0;

    activity
        .laps()
        .iter()
        .enumerate()
        .map(|(lap_index, lap)| {
            let calibrated = calibration.and_then(|calibration| {
                calibration
                    .outcome_for_lap(lap_index)
                    .filter(|outcome| outcome.is_calibrated())
                    .map(|outcome| (calibration.mode, *outcome))
            });

            let overrides = lap_overrides(lap, options, calibrated, gps_offset);
            gps_offset += lap.gps_distance().unwrap_or(0.0);
            overrides
        })
        .collect()
}

fn lap_overrides(
    lap: &Lap,
    options: &ConversionOptions,
    calibrated: Option<(CalibrationMode, CalibrationOutcome)>,
    gps_offset: f64,
) -> LapOverrides {
    let records: Vec<RecordOverrides> = lap
        .trackpoints()
        .iter()
        .map(|point| RecordOverrides {
            distance: if options.recalculate_distance {
                point.gps_distance().map(|distance| distance + gps_offset)
            } else if calibrated.is_some() {
                point.calibrated_distance()
            } else {
                point.distance()
            },
            speed: if options.recalculate_speed {
                point.gps_speed()
            } else if calibrated.is_some() {
                point.calibrated_speed()
            } else {
                point.speed()
            },
        })
        .collect();

    let summary = lap.summary();
    let elapsed = lap.elapsed_seconds();
    let gps_distance = lap.gps_distance();

    let distance_meters = match (options.recalculate_distance, gps_distance, calibrated) {
        (true, Some(gps), _) => Some(gps),
        (_, _, Some((CalibrationMode::PerLap, outcome))) => outcome.reference.map(|reference| reference.meters),
        // Lap totals add up to the activity reference.
        (_, _, Some((CalibrationMode::PerActivity, outcome))) => lap
            .footpod_distance()
            .or(summary.total_distance)
            .map(|distance| distance * outcome.stream_scale),
        _ => lap.recorded_distance(),
    };

    let avg_speed = match (options.recalculate_speed, gps_distance, calibrated) {
        (true, Some(gps), _) if elapsed > 0.0 => Some(gps / elapsed),
        (_, _, Some((CalibrationMode::PerLap, outcome))) if elapsed > 0.0 => {
            outcome.reference.map(|reference| reference.meters / elapsed)
        }
        (_, _, Some((_, outcome))) => summary.avg_speed.map(|speed| speed * outcome.stream_scale),
        _ => summary.avg_speed,
    };

    let max_speed = if options.recalculate_speed {
        records
            .iter()
            .filter_map(|record| record.speed)
            .reduce(f64::max)
    } else if let Some((_, outcome)) = calibrated {
        summary.max_speed.map(|speed| speed * outcome.stream_scale)
    } else {
        summary.max_speed
    };

    LapOverrides {
        distance_meters,
        avg_speed,
        max_speed,
        records,
    }
}
