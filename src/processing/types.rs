use chrono::FixedOffset;

use crate::processing::report::ActivityReport;
use crate::processing::track::Activity;

/// Calibration factor assumed when neither the caller nor the file supplies one.
pub const DEFAULT_CALIBRATION_FACTOR: f64 = 100.0;

/// Simplified representation of a labelled value for display in the UI.
#[derive(Debug, Clone)]
pub struct DisplayField {
    pub name: String,
    pub value: String,
}

/// Human-readable comparison row for one lap.
#[derive(Debug, Clone)]
pub struct DisplayLap {
    pub lap_number: usize,
    pub fields: Vec<DisplayField>,
}

/// Converted activity returned to the web handler and the CLI.
#[derive(Debug, Clone)]
pub struct ConvertedFit {
    /// The track model with every derived stream filled in.
    pub activity: Activity,
    /// GPS/footpod comparison for every lap and the whole activity.
    pub report: ActivityReport,
    /// Lap rows formatted for rendering.
    pub laps: Vec<DisplayLap>,
    /// Serialized TCX document.
    pub tcx_bytes: Vec<u8>,
    /// Summary metrics of the emitted streams.
    pub summary: WorkoutSummary,
}

/// How timestamps in the source file should be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum TimestampZone {
    /// Timestamps are already UTC.
    #[default]
    Utc,
    /// Timestamps are local wall time; resolve the zone from the first position.
    LocalAuto,
    /// Timestamps are local wall time in the given offset.
    Offset(FixedOffset),
}

/// User-facing toggles that control recalculation and calibration.
#[derive(Debug, Clone, Default)]
pub struct ConversionOptions {
    /// Replace the distance stream with GPS-derived cumulative distance.
    pub recalculate_distance: bool,
    /// Replace the speed stream with GPS-derived speed.
    pub recalculate_speed: bool,
    /// Scale footpod distance and speed to a reference distance.
    pub calibrate: bool,
    /// Compute one calibration factor per lap instead of one per activity.
    pub per_lap_calibration: bool,
    /// Known lap distances in meters, applied to laps in order.
    pub manual_lap_distances: Vec<f64>,
    /// Calibration factor (percent) currently set on the watch.
    pub calibration_factor: Option<f64>,
    pub timezone: TimestampZone,
}

impl ConversionOptions {
    pub fn validate(&self) -> Result<(), FitProcessError> {
        if let Some(factor) = self.calibration_factor {
            if !(factor.is_finite() && factor > 0.0) {
                return Err(FitProcessError::InvalidOptions(format!(
                    "calibration factor must be a positive number, got {factor}"
                )));
            }
        }

        if let Some(distance) = self
            .manual_lap_distances
            .iter()
            .find(|distance| !(distance.is_finite() && **distance > 0.0))
        {
            return Err(FitProcessError::InvalidOptions(format!(
                "manual lap distances must be positive numbers, got {distance}"
            )));
        }

        Ok(())
    }

    /// Human-readable summary of which transforms were requested.
    pub fn method_description(&self) -> Option<String> {
        if !(self.recalculate_distance || self.recalculate_speed || self.calibrate) {
            return None;
        }

        let mut parts = Vec::new();
        if self.calibrate {
            if self.per_lap_calibration {
                parts.push("calibration applied per lap");
            } else {
                parts.push("calibration applied");
            }
        }
        match (self.recalculate_distance, self.recalculate_speed) {
            (true, true) => parts.push("speed and distance recalculated"),
            (true, false) => parts.push("distance recalculated"),
            (false, true) => parts.push("speed recalculated"),
            (false, false) => {}
        }

        let reference = if self.calibrate && !self.manual_lap_distances.is_empty() {
            " from known distance (with GPS fill-in)"
        } else {
            " from GPS"
        };

        Some(format!("({}{reference})", parts.join(", ")))
    }
}

/// Parse a UTC offset written as `+HH:MM`, `-HH:MM`, `+HHMM` or `+HH`.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, FitProcessError> {
    let invalid = || FitProcessError::InvalidOptions(format!("invalid UTC offset '{value}'"));

    let trimmed = value.trim();
    let (sign, rest) = match trimmed.chars().next() {
        Some('+') => (1, &trimmed[1..]),
        Some('-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().map_err(|_| invalid())?, 0),
        4 => (
            digits[..2].parse::<i32>().map_err(|_| invalid())?,
            digits[2..].parse::<i32>().map_err(|_| invalid())?,
        ),
        _ => return Err(invalid()),
    };
    if minutes >= 60 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Parse known lap distances given as a comma-separated list of meters.
pub fn parse_lap_distances(value: &str) -> Result<Vec<f64>, FitProcessError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse::<f64>().map_err(|_| {
                FitProcessError::InvalidOptions(format!("invalid lap distance '{entry}'"))
            })
        })
        .collect()
}

/// Derived overview metrics from the emitted streams.
#[derive(Debug, Clone, Default)]
pub struct WorkoutSummary {
    pub duration_seconds: Option<f64>,
    pub workout_type: Option<String>,
    pub distance_meters: Option<f64>,
    pub speed_min: Option<f64>,
    pub speed_mean: Option<f64>,
    pub speed_max: Option<f64>,
    pub heart_rate_min: Option<f64>,
    pub heart_rate_mean: Option<f64>,
    pub heart_rate_max: Option<f64>,
}

/// Structurally invalid record stream. Aborts the conversion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedInputError {
    #[error("activity contains no laps")]
    NoLaps,
    #[error("lap {} contains no trackpoints", lap_index + 1)]
    EmptyLap { lap_index: usize },
    #[error(
        "timestamp of trackpoint {} in lap {} is earlier than the one before it",
        trackpoint_index + 1,
        lap_index + 1
    )]
    NonMonotonicTimestamp {
        lap_index: usize,
        trackpoint_index: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum FitProcessError {
    #[error("Failed to decode FIT file: {0}")]
    ParseError(String),
    #[error("Malformed activity: {0}")]
    MalformedInput(#[from] MalformedInputError),
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    #[error("Failed to write TCX document: {0}")]
    SerializeError(#[from] quick_xml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_valid_and_describe_nothing() {
        let options = ConversionOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.method_description(), None);
    }

    #[test]
    fn non_positive_values_are_rejected() {
        let options = ConversionOptions {
            calibration_factor: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(FitProcessError::InvalidOptions(_))
        ));

        let options = ConversionOptions {
            manual_lap_distances: vec![400.0, -1.0],
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(FitProcessError::InvalidOptions(_))
        ));
    }

    #[test]
    fn method_description_lists_requested_transforms() {
        let options = ConversionOptions {
            calibrate: true,
            per_lap_calibration: true,
            recalculate_distance: true,
            ..Default::default()
        };
        assert_eq!(
            options.method_description().as_deref(),
            Some("(calibration applied per lap, distance recalculated from GPS)")
        );

        let options = ConversionOptions {
            calibrate: true,
            manual_lap_distances: vec![400.0],
            ..Default::default()
        };
        assert_eq!(
            options.method_description().as_deref(),
            Some("(calibration applied from known distance (with GPS fill-in))")
        );
    }

    #[test]
    fn utc_offsets_parse_in_common_forms() {
        assert_eq!(parse_utc_offset("+02:00").ok(), FixedOffset::east_opt(7200));
        assert_eq!(parse_utc_offset("-0530").ok(), FixedOffset::west_opt(5 * 3600 + 1800));
        assert_eq!(parse_utc_offset("+9").ok(), FixedOffset::east_opt(9 * 3600));
        assert!(parse_utc_offset("02:00").is_err());
        assert!(parse_utc_offset("+25:00").is_err());
        assert!(parse_utc_offset("+01:75").is_err());
    }

    #[test]
    fn lap_distances_parse_from_comma_separated_list() {
        assert_eq!(
            parse_lap_distances("400, 800,1609").unwrap(),
            vec![400.0, 800.0, 1609.0]
        );
        assert!(parse_lap_distances("").unwrap().is_empty());
        assert!(parse_lap_distances("400,abc").is_err());
    }

    #[test]
    fn malformed_input_messages_are_one_based() {
        let error = MalformedInputError::NonMonotonicTimestamp {
            lap_index: 0,
            trackpoint_index: 4,
        };
        assert_eq!(
            error.to_string(),
            "timestamp of trackpoint 5 in lap 1 is earlier than the one before it"
        );
    }
}
