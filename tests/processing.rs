use chrono::{DateTime, Duration, TimeZone, Utc};
use rustytcx::processing::calibrate::{CalibrationMode, CalibrationStatus, ReferenceSource};
use rustytcx::processing::geo::GeoDistance;
use rustytcx::processing::records::{Coordinate, RawLap, RawRecord, RawSession, RawTrackpoint};
use rustytcx::processing::timezone::TimezoneBoundaries;
use rustytcx::processing::{
    ConversionOptions, ConvertedFit, FitProcessError, MalformedInputError, TimestampZone,
    convert_fit_bytes, convert_records,
};
use rustytcx::templates::render_converted;

/// Latitude and longitude are meters on a flat plane.
struct Planar;

impl GeoDistance for Planar {
    fn distance(&self, from: Coordinate, to: Coordinate) -> f64 {
        (to.latitude - from.latitude).hypot(to.longitude - from.longitude)
    }
}

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_400_000_000, 0).single().unwrap() + Duration::seconds(seconds)
}

/// One lap per `(gps, footpod)` pair: ten trackpoints ten seconds apart
/// covering the given GPS and footpod distances. `None` GPS means no positions.
fn activity(laps: &[(Option<f64>, f64)]) -> Vec<RawRecord> {
    let mut records = vec![RawRecord::Session(RawSession {
        sport: Some("running".to_string()),
        start_time: Some(at(0)),
        ..Default::default()
    })];
    let mut gps_offset = 0.0;
    let mut footpod_offset = 0.0;

    for (index, &(gps, footpod)) in laps.iter().enumerate() {
        let start = index as i64 * 100;
        for step in 0..10 {
            let fraction = step as f64 / 9.0;
            records.push(RawRecord::Trackpoint(RawTrackpoint {
                coordinate: gps.map(|gps| Coordinate::new(gps_offset + gps * fraction, 0.0)),
                distance: Some(footpod_offset + footpod * fraction),
                speed: Some(footpod / 90.0),
                heart_rate: Some(150),
                ..RawTrackpoint::at(at(start + step * 10))
            }));
        }
        records.push(RawRecord::Lap(RawLap {
            start_time: Some(at(start)),
            end_time: Some(at(start + 90)),
            total_elapsed_time: Some(90.0),
            total_distance: Some(footpod),
            avg_speed: Some(footpod / 90.0),
            max_speed: Some(footpod / 80.0),
            ..Default::default()
        }));
        gps_offset += gps.unwrap_or(0.0) + 10.0;
        footpod_offset += footpod + 10.0;
    }

    records
}

fn convert(records: Vec<RawRecord>, options: &ConversionOptions) -> ConvertedFit {
    convert_records(records, options, &Planar, &TimezoneBoundaries).expect("conversion should succeed")
}

fn calibrated_lap_distance(converted: &ConvertedFit, lap: usize) -> f64 {
    let distances: Vec<f64> = converted.activity.laps()[lap]
        .trackpoints()
        .iter()
        .filter_map(|point| point.calibrated_distance())
        .collect();
    distances.last().unwrap() - distances.first().unwrap()
}

#[test]
fn per_lap_calibration_of_two_even_laps() {
    let options = ConversionOptions {
        calibrate: true,
        per_lap_calibration: true,
        ..Default::default()
    };
    let converted = convert(activity(&[(Some(1000.0), 950.0), (Some(1000.0), 950.0)]), &options);

    let calibration = converted.activity.calibration().unwrap();
    assert_eq!(calibration.mode, CalibrationMode::PerLap);
    for unit in &calibration.units {
        assert!((unit.factor - 1.0526).abs() < 1e-4);
    }
    assert!((calibrated_lap_distance(&converted, 0) - 1000.0).abs() < 1e-9);
    assert!((calibrated_lap_distance(&converted, 1) - 1000.0).abs() < 1e-9);
}

#[test]
fn per_activity_calibration_matches_total_reference() {
    let options = ConversionOptions {
        calibrate: true,
        ..Default::default()
    };
    let converted = convert(activity(&[(Some(1000.0), 950.0), (Some(1500.0), 1300.0)]), &options);

    let applied: f64 = (0..2).map(|lap| calibrated_lap_distance(&converted, lap)).sum();
    assert!((applied - 2500.0).abs() / 2500.0 < 1e-6);
}

#[test]
fn per_activity_calibration_counts_indoor_laps_on_both_sides() {
    let options = ConversionOptions {
        calibrate: true,
        ..Default::default()
    };
    let converted = convert(activity(&[(Some(1000.0), 950.0), (None, 800.0)]), &options);

    let unit = converted.activity.calibration().unwrap().units[0];
    assert_eq!(unit.status, CalibrationStatus::Calibrated);
    assert!((unit.factor - 1800.0 / 1750.0).abs() < 1e-9);

    let applied: f64 = (0..2).map(|lap| calibrated_lap_distance(&converted, lap)).sum();
    assert!((applied - 1800.0).abs() < 1e-6);

    let accuracy = converted.report.comparison.accuracy_percent.unwrap();
    assert!((accuracy - 1750.0 / 1800.0 * 100.0).abs() < 1e-9);
}

#[test]
fn manual_distances_run_out_and_fall_back_to_gps() {
    let options = ConversionOptions {
        calibrate: true,
        per_lap_calibration: true,
        manual_lap_distances: vec![400.0, 800.0, 1609.0],
        ..Default::default()
    };
    let converted = convert(
        activity(&[
            (Some(420.0), 390.0),
            (Some(780.0), 760.0),
            (Some(1580.0), 1500.0),
            (Some(1000.0), 940.0),
            (Some(600.0), 610.0),
        ]),
        &options,
    );

    let units = &converted.activity.calibration().unwrap().units;
    let sources: Vec<_> = units
        .iter()
        .map(|unit| unit.reference.unwrap().source)
        .collect();
    assert_eq!(
        sources,
        vec![
            ReferenceSource::Manual,
            ReferenceSource::Manual,
            ReferenceSource::Manual,
            ReferenceSource::Gps,
            ReferenceSource::Gps,
        ]
    );
    assert!((units[3].factor - 1000.0 / 940.0).abs() < 1e-9);
    assert!((units[4].factor - 600.0 / 610.0).abs() < 1e-9);
}

#[test]
fn lap_without_positions_is_reported_and_left_alone() {
    let options = ConversionOptions {
        calibrate: true,
        per_lap_calibration: true,
        ..Default::default()
    };
    let converted = convert(activity(&[(Some(1000.0), 950.0), (None, 800.0)]), &options);

    let lap = &converted.report.laps[1];
    assert_eq!(lap.comparison.gps_distance, None);
    assert_eq!(lap.calibration.factor, 1.0);
    assert!(matches!(lap.calibration.status, CalibrationStatus::Uncalibrated(_)));
    assert!(lap.notes.contains("calculated via GPS: unavailable"));

    let xml = String::from_utf8(converted.tcx_bytes.clone()).unwrap();
    assert!(xml.contains("lap left uncalibrated"));
}

#[test]
fn recalculated_distance_reaches_the_tcx_document() {
    let options = ConversionOptions {
        recalculate_distance: true,
        recalculate_speed: true,
        ..Default::default()
    };
    let converted = convert(activity(&[(Some(1000.0), 950.0), (Some(1000.0), 950.0)]), &options);
    let xml = String::from_utf8(converted.tcx_bytes.clone()).unwrap();

    assert!(xml.contains("<DistanceMeters>1000.00</DistanceMeters>"));
    assert!(xml.contains("<DistanceMeters>2000.00</DistanceMeters>"));
    assert!(xml.contains("(speed and distance recalculated from GPS)"));
    assert!((converted.summary.distance_meters.unwrap() - 2000.0).abs() < 1e-6);
}

#[test]
fn local_time_in_madrid_is_shifted_by_summer_time() {
    let mut records = activity(&[(Some(1000.0), 950.0)]);
    for record in &mut records {
        if let RawRecord::Trackpoint(point) = record {
            point.coordinate = point
                .coordinate
                .map(|coordinate| Coordinate::new(40.4168 + coordinate.latitude / 1e6, -3.7038));
        }
    }
    let options = ConversionOptions {
        timezone: TimestampZone::LocalAuto,
        ..Default::default()
    };
    let converted = convert(records, &options);

    let first = converted.activity.laps()[0].trackpoints()[0].timestamp();
    // Madrid keeps CEST (+02:00) in May despite lying west of Greenwich.
    assert_eq!(first, at(-2 * 3600));
}

#[test]
fn malformed_streams_abort_with_position() {
    let mut records = activity(&[(Some(1000.0), 950.0)]);
    if let Some(RawRecord::Trackpoint(point)) = records.get_mut(4) {
        point.timestamp = at(5);
    }
    let error = convert_records(records, &ConversionOptions::default(), &Planar, &TimezoneBoundaries)
        .unwrap_err();

    assert!(matches!(
        error,
        FitProcessError::MalformedInput(MalformedInputError::NonMonotonicTimestamp {
            lap_index: 0,
            ..
        })
    ));
}

#[test]
fn undecodable_bytes_are_a_parse_error() {
    let error = convert_fit_bytes(&[0u8; 16], &ConversionOptions::default()).unwrap_err();
    assert!(matches!(error, FitProcessError::ParseError(_)));
}

#[test]
fn rendered_output_includes_summary_notes_and_download_link() {
    let converted = convert(activity(&[(Some(1000.0), 950.0)]), &ConversionOptions::default());
    let rendered = render_converted(&converted, "/download/test");

    assert!(rendered.contains("Workout Overview"));
    assert!(rendered.contains("Download TCX"));
    assert!(rendered.contains("href=\"/download/test\""));
    assert!(rendered.contains("Lap 1: 0.950 km in 0:01:30"));
    assert!(rendered.contains("<td>95.0%</td>"));
}
