//! Strongly typed view of the FIT messages the converter consumes.
//!
//! The decoder adapter in [`crate::processing::parse`] turns `fitparser`'s
//! loosely typed field bags into these variants, so everything downstream of
//! parsing only deals with named, typed values.

use chrono::{DateTime, Utc};

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// One decoded FIT message relevant to the conversion.
#[derive(Debug, Clone)]
pub enum RawRecord {
    FileId(RawDevice),
    DeviceInfo(RawDevice),
    Session(RawSession),
    Lap(RawLap),
    Trackpoint(RawTrackpoint),
    /// Footpod calibration factor stored on the device, in percent.
    CalibrationFactor(f64),
}

/// Recording device identity, from `file_id` or `device_info` messages.
#[derive(Debug, Clone, Default)]
pub struct RawDevice {
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
    pub product_id: Option<u16>,
    pub serial_number: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct RawSession {
    pub sport: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub total_distance: Option<f64>,
    pub total_timer_time: Option<f64>,
    pub num_laps: Option<u16>,
}

/// Lap summary message. FIT writes these after the records they cover.
#[derive(Debug, Clone, Default)]
pub struct RawLap {
    pub start_time: Option<DateTime<Utc>>,
    /// The lap message `timestamp`, i.e. the end of the lap.
    pub end_time: Option<DateTime<Utc>>,
    pub total_elapsed_time: Option<f64>,
    pub total_distance: Option<f64>,
    pub max_speed: Option<f64>,
    pub avg_speed: Option<f64>,
    pub total_calories: Option<u16>,
    pub avg_heart_rate: Option<u8>,
    pub max_heart_rate: Option<u8>,
    pub avg_cadence: Option<u8>,
    pub max_cadence: Option<u8>,
    pub intensity: Option<String>,
    pub lap_trigger: Option<String>,
}

/// A single `record` message.
#[derive(Debug, Clone)]
pub struct RawTrackpoint {
    pub timestamp: DateTime<Utc>,
    pub coordinate: Option<Coordinate>,
    pub altitude: Option<f64>,
    /// Footpod (or device) cumulative distance in meters.
    pub distance: Option<f64>,
    /// Footpod (or device) instantaneous speed in m/s.
    pub speed: Option<f64>,
    pub heart_rate: Option<u8>,
    pub cadence: Option<u8>,
}

impl RawTrackpoint {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            coordinate: None,
            altitude: None,
            distance: None,
            speed: None,
            heart_rate: None,
            cadence: None,
        }
    }
}

impl RawRecord {
    /// Apply `shift` to every timestamp carried by this record.
    pub(crate) fn map_timestamps(&mut self, shift: impl Fn(DateTime<Utc>) -> DateTime<Utc>) {
        match self {
            RawRecord::Session(session) => {
                session.start_time = session.start_time.map(&shift);
            }
            RawRecord::Lap(lap) => {
                lap.start_time = lap.start_time.map(&shift);
                lap.end_time = lap.end_time.map(&shift);
            }
            RawRecord::Trackpoint(point) => {
                point.timestamp = shift(point.timestamp);
            }
            RawRecord::FileId(_) | RawRecord::DeviceInfo(_) | RawRecord::CalibrationFactor(_) => {}
        }
    }
}
