//! Footpod calibration against a trusted reference distance.
//!
//! A calibration unit is either the whole activity or a single lap. For each
//! unit the reference distance is resolved in a fixed order (known distance,
//! then GPS), and the footpod distance is normalized by the factor already set
//! on the watch so the new factor applies to raw footpod counts.

use crate::processing::track::{Activity, Lap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationMode {
    PerActivity,
    PerLap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSource {
    Manual,
    Gps,
}

impl ReferenceSource {
    pub fn describe(self) -> &'static str {
        match self {
            ReferenceSource::Manual => "known distance",
            ReferenceSource::Gps => "GPS",
        }
    }
}

/// Precedence of reference sources; the first available one wins.
pub const RESOLUTION_ORDER: [ReferenceSource; 2] = [ReferenceSource::Manual, ReferenceSource::Gps];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceDistance {
    pub meters: f64,
    pub source: ReferenceSource,
}

/// Reference distances available for one calibration unit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReferenceCandidates {
    pub manual: Option<f64>,
    pub gps: Option<f64>,
}

impl ReferenceCandidates {
    pub fn for_lap(lap: &Lap) -> Self {
        Self {
            manual: lap.manual_distance(),
            gps: lap.gps_distance(),
        }
    }

    /// Both candidates cover the laps that recorded footpod distance, the same
    /// laps [`Activity::footpod_distance`] sums. Known distances are summed
    /// when any were given; other laps are filled in from GPS, then from
    /// their own footpod distance.
    pub fn for_activity(activity: &Activity) -> Self {
        let laps: Vec<&Lap> = activity
            .laps()
            .iter()
            .filter(|lap| lap.footpod_distance().is_some())
            .collect();
        let manual = if laps.iter().any(|lap| lap.manual_distance().is_some()) {
            laps.iter()
                .map(|lap| {
                    lap.manual_distance()
                        .or(lap.gps_distance())
                        .or(lap.footpod_distance())
                })
                .sum::<Option<f64>>()
        } else {
            None
        };

        Self {
            manual,
            gps: activity.reference_gps_distance(),
        }
    }

    pub fn resolve(&self) -> Option<ReferenceDistance> {
        RESOLUTION_ORDER.iter().find_map(|&source| {
            let meters = match source {
                ReferenceSource::Manual => self.manual,
                ReferenceSource::Gps => self.gps,
            }?;
            (meters.is_finite() && meters > 0.0).then_some(ReferenceDistance { meters, source })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UncalibratedReason {
    NoReferenceDistance,
    NoFootpodDistance,
}

impl UncalibratedReason {
    pub fn describe(self) -> &'static str {
        match self {
            UncalibratedReason::NoReferenceDistance => "no GPS or known reference distance",
            UncalibratedReason::NoFootpodDistance => "no footpod distance recorded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationStatus {
    Calibrated,
    Uncalibrated(UncalibratedReason),
}

/// Calibration computed for one unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationOutcome {
    /// Reference distance over normalized footpod distance; 1.0 when uncalibrated.
    pub factor: f64,
    /// Multiplier applied to the recorded footpod streams; 1.0 when uncalibrated.
    pub stream_scale: f64,
    pub reference: Option<ReferenceDistance>,
    /// Footpod distance with the existing watch factor divided out.
    pub footpod_distance: Option<f64>,
    pub status: CalibrationStatus,
}

impl CalibrationOutcome {
    pub fn compute(
        candidates: ReferenceCandidates,
        recorded_footpod_distance: Option<f64>,
        existing_factor: f64,
    ) -> Self {
        let footpod_distance = recorded_footpod_distance.map(|distance| distance / (existing_factor / 100.0));
        let reference = candidates.resolve();

        let uncalibrated = |reason| CalibrationOutcome {
            factor: 1.0,
            stream_scale: 1.0,
            reference,
            footpod_distance,
            status: CalibrationStatus::Uncalibrated(reason),
        };

        let Some(reference_distance) = reference else {
            return uncalibrated(UncalibratedReason::NoReferenceDistance);
        };
        let (Some(recorded), Some(normalized)) = (recorded_footpod_distance, footpod_distance) else {
            return uncalibrated(UncalibratedReason::NoFootpodDistance);
        };
        if !(recorded.is_finite() && recorded > 0.0) {
            return uncalibrated(UncalibratedReason::NoFootpodDistance);
        }

        CalibrationOutcome {
            factor: reference_distance.meters / normalized,
            stream_scale: reference_distance.meters / recorded,
            reference,
            footpod_distance,
            status: CalibrationStatus::Calibrated,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.status == CalibrationStatus::Calibrated
    }

    /// The factor to program into the watch, in percent.
    pub fn new_factor_percent(&self) -> Option<f64> {
        self.is_calibrated().then_some(self.factor * 100.0)
    }
}

/// Calibration applied to an activity.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedCalibration {
    pub mode: CalibrationMode,
    pub existing_factor: f64,
    /// One outcome per lap in per-lap mode, a single one otherwise.
    pub units: Vec<CalibrationOutcome>,
}

impl AppliedCalibration {
    pub fn outcome_for_lap(&self, lap_index: usize) -> Option<&CalibrationOutcome> {
        match self.mode {
            CalibrationMode::PerLap => self.units.get(lap_index),
            CalibrationMode::PerActivity => self.units.first(),
        }
    }
}

pub struct CalibrationEngine {
    mode: CalibrationMode,
    existing_factor: f64,
}

impl CalibrationEngine {
    pub fn new(mode: CalibrationMode, existing_factor: f64) -> Self {
        Self {
            mode,
            existing_factor,
        }
    }

    /// Compute the outcome of every unit without touching the activity.
    pub fn unit_outcomes(&self, activity: &Activity) -> Vec<CalibrationOutcome> {
        match self.mode {
            CalibrationMode::PerActivity => vec![CalibrationOutcome::compute(
                ReferenceCandidates::for_activity(activity),
                activity.footpod_distance(),
                self.existing_factor,
            )],
            CalibrationMode::PerLap => activity
                .laps()
                .iter()
                .map(|lap| {
                    CalibrationOutcome::compute(
                        ReferenceCandidates::for_lap(lap),
                        lap.footpod_distance(),
                        self.existing_factor,
                    )
                })
                .collect(),
        }
    }

    /// Scale footpod distance and speed of every calibrated unit.
    pub fn run(&self, activity: &mut Activity) {
        let calibration = AppliedCalibration {
            mode: self.mode,
            existing_factor: self.existing_factor,
            units: self.unit_outcomes(activity),
        };

        for (unit, outcome) in calibration.units.iter().enumerate() {
            if let CalibrationStatus::Uncalibrated(reason) = outcome.status {
                tracing::warn!(
                    unit = unit + 1,
                    mode = ?self.mode,
                    reason = reason.describe(),
                    "footpod left uncalibrated"
                );
            }
        }

        for (lap_index, lap) in activity.laps_mut().iter_mut().enumerate() {
            let scale = calibration
                .outcome_for_lap(lap_index)
                .filter(|outcome| outcome.is_calibrated())
                .map(|outcome| outcome.stream_scale);

            for point in lap.trackpoints_mut() {
                match scale {
                    Some(scale) => point.set_calibrated(
                        point.distance().map(|distance| distance * scale),
                        point.speed().map(|speed| speed * scale),
                    ),
                    None => point.set_calibrated(None, None),
                }
            }
        }

        activity.set_calibration(calibration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::recalc::RecalcEngine;
    use crate::processing::recalc::tests::PlanarMeters;
    use crate::processing::track::tests::{lap, point};

    /// Laps of ten points, ten seconds apart, with the given GPS and footpod
    /// distance per lap.
    fn activity(laps: &[(f64, f64)]) -> Activity {
        let mut records = Vec::new();
        let mut footpod_offset = 0.0;
        let mut gps_offset = 0.0;
        for (lap_index, &(gps, footpod)) in laps.iter().enumerate() {
            let start = lap_index as i64 * 100;
            for step in 0..10 {
                let fraction = step as f64 / 9.0;
                records.push(point(
                    start + step * 10,
                    Some(footpod_offset + footpod * fraction),
                    Some((gps_offset + gps * fraction, 0.0)),
                ));
            }
            records.push(lap(start, start + 90));
            footpod_offset += footpod + 5.0;
            gps_offset += gps + 5.0;
        }

        let mut activity = Activity::build(records).expect("activity should build");
        RecalcEngine::new(&PlanarMeters).run(&mut activity);
        activity
    }

    fn applied_distance(lap: &Lap) -> f64 {
        let calibrated: Vec<f64> = lap
            .trackpoints()
            .iter()
            .filter_map(|point| point.calibrated_distance())
            .collect();
        calibrated.last().copied().unwrap_or_default() - calibrated.first().copied().unwrap_or_default()
    }

    #[test]
    fn resolution_prefers_manual_then_gps() {
        let both = ReferenceCandidates {
            manual: Some(400.0),
            gps: Some(390.0),
        };
        assert_eq!(
            both.resolve(),
            Some(ReferenceDistance {
                meters: 400.0,
                source: ReferenceSource::Manual
            })
        );

        let gps_only = ReferenceCandidates {
            manual: None,
            gps: Some(390.0),
        };
        assert_eq!(gps_only.resolve().map(|reference| reference.source), Some(ReferenceSource::Gps));

        let zero_gps = ReferenceCandidates {
            manual: None,
            gps: Some(0.0),
        };
        assert_eq!(zero_gps.resolve(), None);
        assert_eq!(ReferenceCandidates::default().resolve(), None);
    }

    #[test]
    fn factor_is_relative_to_raw_footpod_counts() {
        let outcome = CalibrationOutcome::compute(
            ReferenceCandidates {
                manual: Some(1000.0),
                gps: None,
            },
            Some(1000.0),
            98.0,
        );

        assert!(outcome.is_calibrated());
        assert!((outcome.factor - 0.98).abs() < 1e-12);
        assert!((outcome.stream_scale - 1.0).abs() < 1e-12);
        assert!((outcome.new_factor_percent().unwrap() - 98.0).abs() < 1e-9);
    }

    #[test]
    fn zero_footpod_distance_is_left_uncalibrated() {
        let outcome = CalibrationOutcome::compute(
            ReferenceCandidates {
                manual: None,
                gps: Some(1000.0),
            },
            Some(0.0),
            100.0,
        );

        assert_eq!(
            outcome.status,
            CalibrationStatus::Uncalibrated(UncalibratedReason::NoFootpodDistance)
        );
        assert_eq!(outcome.factor, 1.0);
        assert_eq!(outcome.new_factor_percent(), None);
    }

    #[test]
    fn per_lap_calibration_hits_each_reference_exactly() {
        let mut activity = activity(&[(1000.0, 950.0), (1000.0, 950.0)]);
        CalibrationEngine::new(CalibrationMode::PerLap, 100.0).run(&mut activity);

        let calibration = activity.calibration().expect("calibration should be recorded");
        assert_eq!(calibration.units.len(), 2);
        for (index, lap) in activity.laps().iter().enumerate() {
            let outcome = calibration.outcome_for_lap(index).unwrap();
            assert!((outcome.factor - 1000.0 / 950.0).abs() < 1e-9);
            assert!((applied_distance(lap) - 1000.0).abs() < 1e-6);
        }
    }

    #[test]
    fn per_activity_calibration_hits_the_total_reference() {
        let mut activity = activity(&[(1000.0, 950.0), (1200.0, 1000.0)]);
        CalibrationEngine::new(CalibrationMode::PerActivity, 100.0).run(&mut activity);

        let total: f64 = activity.laps().iter().map(applied_distance).sum();
        assert!((total - 2200.0).abs() / 2200.0 < 1e-6);
        assert_eq!(activity.calibration().unwrap().units.len(), 1);
    }

    #[test]
    fn per_lap_and_per_activity_differ_when_accuracy_varies() {
        let laps = [(1000.0, 950.0), (1000.0, 1100.0)];

        let mut per_lap = activity(&laps);
        CalibrationEngine::new(CalibrationMode::PerLap, 100.0).run(&mut per_lap);
        let mut per_activity = activity(&laps);
        CalibrationEngine::new(CalibrationMode::PerActivity, 100.0).run(&mut per_activity);

        let per_lap_first = applied_distance(&per_lap.laps()[0]);
        let per_activity_first = applied_distance(&per_activity.laps()[0]);
        assert!((per_lap_first - per_activity_first).abs() > 1.0);

        let factors: Vec<f64> = per_lap.calibration().unwrap().units.iter().map(|unit| unit.factor).collect();
        assert!((factors[0] - factors[1]).abs() > 0.05);
    }

    #[test]
    fn manual_distances_fall_back_to_gps_for_later_laps() {
        let mut activity = activity(&[
            (410.0, 390.0),
            (790.0, 780.0),
            (1600.0, 1500.0),
            (1000.0, 900.0),
            (500.0, 520.0),
        ]);
        activity.assign_manual_distances(&[400.0, 800.0, 1609.0]);
        CalibrationEngine::new(CalibrationMode::PerLap, 100.0).run(&mut activity);

        let calibration = activity.calibration().unwrap();
        let sources: Vec<_> = calibration
            .units
            .iter()
            .map(|unit| unit.reference.map(|reference| reference.source))
            .collect();
        assert_eq!(
            sources,
            vec![
                Some(ReferenceSource::Manual),
                Some(ReferenceSource::Manual),
                Some(ReferenceSource::Manual),
                Some(ReferenceSource::Gps),
                Some(ReferenceSource::Gps),
            ]
        );
        assert!((calibration.units[3].factor - 1000.0 / 900.0).abs() < 1e-9);
        assert!((calibration.units[4].factor - 500.0 / 520.0).abs() < 1e-9);
        assert!((applied_distance(&activity.laps()[2]) - 1609.0).abs() < 1e-6);
    }

    #[test]
    fn per_activity_sums_manual_distances_with_gps_fill_in() {
        let mut activity = activity(&[(410.0, 390.0), (790.0, 780.0), (1000.0, 900.0)]);
        activity.assign_manual_distances(&[400.0, 800.0]);

        let candidates = ReferenceCandidates::for_activity(&activity);
        assert!((candidates.manual.unwrap() - 2200.0).abs() < 1e-9);

        CalibrationEngine::new(CalibrationMode::PerActivity, 100.0).run(&mut activity);
        let total: f64 = activity.laps().iter().map(applied_distance).sum();
        assert!((total - 2200.0).abs() < 1e-6);
    }

    #[test]
    fn per_activity_reference_covers_indoor_laps_with_footpod_distance() {
        let mut records = Vec::new();
        for step in 0..10 {
            let fraction = step as f64 / 9.0;
            records.push(point(step * 10, Some(950.0 * fraction), Some((1000.0 * fraction, 0.0))));
        }
        records.push(lap(0, 90));
        for step in 0..10 {
            let fraction = step as f64 / 9.0;
            records.push(point(100 + step * 10, Some(955.0 + 800.0 * fraction), None));
        }
        records.push(lap(100, 190));
        let mut activity = Activity::build(records).expect("activity should build");
        RecalcEngine::new(&PlanarMeters).run(&mut activity);

        assert!((activity.gps_distance().unwrap() - 1000.0).abs() < 1e-9);
        assert!((activity.reference_gps_distance().unwrap() - 1800.0).abs() < 1e-9);

        CalibrationEngine::new(CalibrationMode::PerActivity, 100.0).run(&mut activity);
        let outcome = activity.calibration().unwrap().units[0];
        assert!(outcome.is_calibrated());
        assert!((outcome.factor - 1800.0 / 1750.0).abs() < 1e-9);

        let indoor = applied_distance(&activity.laps()[1]);
        assert!((indoor - 800.0 * 1800.0 / 1750.0).abs() < 1e-6);
        let total: f64 = activity.laps().iter().map(applied_distance).sum();
        assert!((total - 1800.0).abs() < 1e-6);
    }

    #[test]
    fn lap_without_positions_is_left_uncalibrated() {
        let mut records = Vec::new();
        for step in 0..5 {
            records.push(point(step * 10, Some(step as f64 * 25.0), None));
        }
        records.push(lap(0, 40));
        let mut activity = Activity::build(records).expect("activity should build");
        RecalcEngine::new(&PlanarMeters).run(&mut activity);

        CalibrationEngine::new(CalibrationMode::PerLap, 100.0).run(&mut activity);

        let outcome = activity.calibration().unwrap().units[0];
        assert_eq!(outcome.factor, 1.0);
        assert_eq!(
            outcome.status,
            CalibrationStatus::Uncalibrated(UncalibratedReason::NoReferenceDistance)
        );
        assert!(activity.laps()[0]
            .trackpoints()
            .iter()
            .all(|point| point.calibrated_distance().is_none()));
    }

    #[test]
    fn calibration_never_touches_recorded_values() {
        let mut activity = activity(&[(1000.0, 950.0)]);
        let before: Vec<_> = activity.laps()[0].trackpoints().iter().map(|p| p.distance()).collect();

        CalibrationEngine::new(CalibrationMode::PerActivity, 100.0).run(&mut activity);

        let after: Vec<_> = activity.laps()[0].trackpoints().iter().map(|p| p.distance()).collect();
        assert_eq!(before, after);
    }
}
