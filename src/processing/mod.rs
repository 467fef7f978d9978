pub mod calibrate;
pub mod display;
pub mod geo;
pub mod overrides;
pub mod parse;
pub mod recalc;
pub mod records;
pub mod report;
pub mod summary;
pub mod tcx;
pub mod timezone;
pub mod track;
pub mod types;

use calibrate::{CalibrationEngine, CalibrationMode};
use display::to_display_laps;
use geo::{GeoDistance, HaversineDistance};
use overrides::compute_lap_overrides;
use parse::parse_fit;
use recalc::RecalcEngine;
use records::RawRecord;
use report::build_report;
use summary::derive_workout_summary;
use tcx::write_tcx;
use timezone::{TimezoneBoundaries, TimezoneResolver, correct_timestamps};
use track::Activity;

pub use types::{
    ConversionOptions, ConvertedFit, DEFAULT_CALIBRATION_FACTOR, DisplayField, DisplayLap,
    FitProcessError, MalformedInputError, TimestampZone, WorkoutSummary,
};

/// Decode a FIT payload and convert it to TCX with the haversine distance and
/// time zone boundary resolver.
pub fn convert_fit_bytes(
    bytes: &[u8],
    options: &ConversionOptions,
) -> Result<ConvertedFit, FitProcessError> {
    options.validate()?;
    let records = parse_fit(bytes)?;
    convert_records(records, options, &HaversineDistance, &TimezoneBoundaries)
}

/// Run the conversion on an already decoded record stream.
///
/// The stages run in a fixed order:
/// 1. [`timezone::correct_timestamps`] shifts local timestamps to UTC when asked.
/// 2. [`Activity::build`] assembles laps and rejects malformed streams.
/// 3. [`RecalcEngine`] fills in GPS distance and speed for every trackpoint.
/// 4. [`CalibrationEngine`] scales the footpod streams when calibration is on.
/// 5. [`overrides::compute_lap_overrides`] picks the values to write out.
/// 6. [`report::build_report`] and [`tcx::write_tcx`] produce the outputs.
pub fn convert_records(
    mut records: Vec<RawRecord>,
    options: &ConversionOptions,
    geo: &dyn GeoDistance,
    resolver: &dyn TimezoneResolver,
) -> Result<ConvertedFit, FitProcessError> {
    options.validate()?;

    correct_timestamps(&mut records, options.timezone, resolver);
    let mut activity = Activity::build(records)?;
    activity.assign_manual_distances(&options.manual_lap_distances);
    if options.manual_lap_distances.len() > activity.laps().len() {
        tracing::warn!(
            given = options.manual_lap_distances.len(),
            laps = activity.laps().len(),
            "more known distances than laps; extra values ignored"
        );
    }

    RecalcEngine::new(geo).run(&mut activity);

    let existing_factor = options
        .calibration_factor
        .or(activity.recorded_calibration_factor())
        .unwrap_or(DEFAULT_CALIBRATION_FACTOR);

    if options.calibrate {
        let mode = if options.per_lap_calibration {
            CalibrationMode::PerLap
        } else {
            CalibrationMode::PerActivity
        };
        CalibrationEngine::new(mode, existing_factor).run(&mut activity);
    }

    let overrides = compute_lap_overrides(&activity, options);
    let report = build_report(&activity, options, existing_factor, &overrides);
    let tcx_bytes = write_tcx(&activity, &report, &overrides)?;
    let summary = derive_workout_summary(&activity, &overrides);
    let laps = to_display_laps(&report);

    tracing::info!(
        laps = activity.laps().len(),
        existing_factor,
        gps_distance = ?activity.gps_distance(),
        footpod_distance = ?activity.footpod_distance(),
        tcx_bytes = tcx_bytes.len(),
        "converted activity"
    );

    Ok(ConvertedFit {
        activity,
        report,
        laps,
        tcx_bytes,
        summary,
    })
}
