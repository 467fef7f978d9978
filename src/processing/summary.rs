use crate::processing::overrides::LapOverrides;
use crate::processing::track::Activity;
use crate::processing::types::WorkoutSummary;

/// Overview metrics computed from the streams as they are written out.
pub fn derive_workout_summary(activity: &Activity, overrides: &[LapOverrides]) -> WorkoutSummary {
    let trackpoints = activity.laps().iter().flat_map(|lap| lap.trackpoints());

    let duration_seconds = derive_duration(
        &trackpoints
            .clone()
            .map(|point| point.timestamp().timestamp_millis() as f64 / 1000.0)
            .collect::<Vec<_>>(),
    );

    let lap_distances: Vec<f64> = overrides.iter().filter_map(|lap| lap.distance_meters).collect();
    let distance_meters = if lap_distances.is_empty() {
        overrides
            .iter()
            .flat_map(|lap| &lap.records)
            .filter_map(|record| record.distance)
            .reduce(f64::max)
    } else {
        Some(lap_distances.iter().sum())
    };

    let speeds: Vec<f64> = overrides
        .iter()
        .flat_map(|lap| &lap.records)
        .filter_map(|record| record.speed)
        .filter(|speed| *speed > 0.0)
        .collect();

    let heart_rates: Vec<f64> = trackpoints
        .filter_map(|point| point.heart_rate())
        .map(f64::from)
        .collect();

    WorkoutSummary {
        duration_seconds,
        workout_type: activity.sport().map(str::to_string),
        distance_meters,
        speed_min: speeds.iter().cloned().reduce(f64::min),
        speed_mean: mean(&speeds),
        speed_max: speeds.iter().cloned().reduce(f64::max),
        heart_rate_min: heart_rates.iter().cloned().reduce(f64::min),
        heart_rate_mean: mean(&heart_rates),
        heart_rate_max: heart_rates.iter().cloned().reduce(f64::max),
    }
}

fn derive_duration(timestamps: &[f64]) -> Option<f64> {
    let (min_ts, max_ts) = timestamps
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |acc, &ts| {
            (acc.0.min(ts), acc.1.max(ts))
        });
    if min_ts.is_infinite() || max_ts.is_infinite() {
        None
    } else {
        Some(max_ts - min_ts)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
