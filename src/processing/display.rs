use crate::processing::report::{ActivityReport, LapReport, format_elapsed, format_km, format_percent};
use crate::processing::types::{DisplayField, DisplayLap};

/// Build UI-friendly lap rows from the comparison report.
pub fn to_display_laps(report: &ActivityReport) -> Vec<DisplayLap> {
    report
        .laps
        .iter()
        .map(|lap| DisplayLap {
            lap_number: lap.lap_number,
            fields: lap_fields(lap),
        })
        .collect()
}

fn lap_fields(lap: &LapReport) -> Vec<DisplayField> {
    let field = |name: &str, value: String| DisplayField {
        name: name.to_string(),
        value,
    };

    let new_factor = match lap.calibration.new_factor_percent() {
        Some(percent) => format!("{percent:.1}%"),
        None => "uncalibrated".to_string(),
    };

    vec![
        field("Time", format_elapsed(lap.elapsed_seconds)),
        field("Distance", format_km(lap.distance_used)),
        field("FIT distance", format_km(lap.comparison.footpod_distance)),
        field("GPS distance", format_km(lap.comparison.gps_distance)),
        field("Known distance", format_km(lap.manual_distance)),
        field("Accuracy", format_percent(lap.comparison.accuracy_percent)),
        field("New factor", new_factor),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::calibrate::{CalibrationOutcome, ReferenceCandidates};
    use crate::processing::report::DistanceComparison;

    #[test]
    fn lap_rows_format_missing_values_as_unavailable() {
        let lap = LapReport {
            lap_number: 3,
            comparison: DistanceComparison::new(None, Some(800.0), 100.0),
            manual_distance: None,
            calibration: CalibrationOutcome::compute(ReferenceCandidates::default(), Some(800.0), 100.0),
            distance_used: Some(800.0),
            elapsed_seconds: 245.0,
            notes: String::new(),
        };

        let fields = lap_fields(&lap);
        let value = |name: &str| {
            fields
                .iter()
                .find(|field| field.name == name)
                .map(|field| field.value.as_str())
        };

        assert_eq!(value("Time"), Some("0:04:05"));
        assert_eq!(value("Distance"), Some("0.800 km"));
        assert_eq!(value("GPS distance"), Some("unavailable"));
        assert_eq!(value("Accuracy"), Some("unavailable"));
        assert_eq!(value("New factor"), Some("uncalibrated"));
    }
}
