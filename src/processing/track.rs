//! In-memory activity model: laps of trackpoints in recording order.
//!
//! The model is built once from the raw record stream. Original footpod
//! values are never modified afterwards; the recalculation and calibration
//! stages only fill in the derived fields through crate-internal setters.

use chrono::{DateTime, Utc};

use crate::processing::calibrate::AppliedCalibration;
use crate::processing::records::{
    Coordinate, RawDevice, RawLap, RawRecord, RawSession, RawTrackpoint,
};
use crate::processing::types::MalformedInputError;

#[derive(Debug, Clone)]
pub struct Trackpoint {
    timestamp: DateTime<Utc>,
    coordinate: Option<Coordinate>,
    altitude: Option<f64>,
    distance: Option<f64>,
    speed: Option<f64>,
    heart_rate: Option<u8>,
    cadence: Option<u8>,
    gps_distance: Option<f64>,
    gps_speed: Option<f64>,
    calibrated_distance: Option<f64>,
    calibrated_speed: Option<f64>,
}

impl From<RawTrackpoint> for Trackpoint {
    fn from(raw: RawTrackpoint) -> Self {
        Self {
            timestamp: raw.timestamp,
            coordinate: raw.coordinate,
            altitude: raw.altitude,
            distance: raw.distance,
            speed: raw.speed,
            heart_rate: raw.heart_rate,
            cadence: raw.cadence,
            gps_distance: None,
            gps_speed: None,
            calibrated_distance: None,
            calibrated_speed: None,
        }
    }
}

impl Trackpoint {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        self.coordinate
    }

    pub fn altitude(&self) -> Option<f64> {
        self.altitude
    }

    /// Footpod-reported cumulative distance, as recorded.
    pub fn distance(&self) -> Option<f64> {
        self.distance
    }

    /// Footpod-reported speed, as recorded.
    pub fn speed(&self) -> Option<f64> {
        self.speed
    }

    pub fn heart_rate(&self) -> Option<u8> {
        self.heart_rate
    }

    pub fn cadence(&self) -> Option<u8> {
        self.cadence
    }

    /// GPS cumulative distance from the first positioned point of the lap.
    pub fn gps_distance(&self) -> Option<f64> {
        self.gps_distance
    }

    pub fn gps_speed(&self) -> Option<f64> {
        self.gps_speed
    }

    pub fn calibrated_distance(&self) -> Option<f64> {
        self.calibrated_distance
    }

    pub fn calibrated_speed(&self) -> Option<f64> {
        self.calibrated_speed
    }

    pub(crate) fn set_gps(&mut self, distance: Option<f64>, speed: Option<f64>) {
        self.gps_distance = distance;
        self.gps_speed = speed;
    }

    pub(crate) fn set_calibrated(&mut self, distance: Option<f64>, speed: Option<f64>) {
        self.calibrated_distance = distance;
        self.calibrated_speed = speed;
    }
}

#[derive(Debug, Clone)]
pub struct Lap {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    summary: RawLap,
    trackpoints: Vec<Trackpoint>,
    manual_distance: Option<f64>,
    gps_distance: Option<f64>,
}

impl Lap {
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// The lap message as recorded by the device.
    pub fn summary(&self) -> &RawLap {
        &self.summary
    }

    pub fn trackpoints(&self) -> &[Trackpoint] {
        &self.trackpoints
    }

    pub(crate) fn trackpoints_mut(&mut self) -> &mut [Trackpoint] {
        &mut self.trackpoints
    }

    /// Known distance supplied by the user for this lap.
    pub fn manual_distance(&self) -> Option<f64> {
        self.manual_distance
    }

    /// Sum of inter-point GPS distances; `None` with fewer than two positions.
    pub fn gps_distance(&self) -> Option<f64> {
        self.gps_distance
    }

    pub(crate) fn set_gps_distance(&mut self, distance: Option<f64>) {
        self.gps_distance = distance;
    }

    /// Footpod distance covered within the lap: last reported cumulative
    /// distance minus the first one.
    pub fn footpod_distance(&self) -> Option<f64> {
        let mut reported = self.trackpoints.iter().filter_map(Trackpoint::distance);
        let first = reported.next()?;
        let last = reported.last().unwrap_or(first);
        Some(last - first)
    }

    /// Recorded lap distance, falling back to the trackpoint stream.
    pub fn recorded_distance(&self) -> Option<f64> {
        self.summary.total_distance.or_else(|| self.footpod_distance())
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.summary.total_elapsed_time.unwrap_or_else(|| {
            (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0
        })
    }
}

#[derive(Debug, Clone)]
pub struct Activity {
    start_time: DateTime<Utc>,
    laps: Vec<Lap>,
    session: Option<RawSession>,
    device: Option<RawDevice>,
    recorded_calibration_factor: Option<f64>,
    calibration: Option<AppliedCalibration>,
}

struct LapWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    summary: RawLap,
    trackpoints: Vec<Trackpoint>,
}

impl Activity {
    /// Assemble laps and trackpoints from the raw record stream.
    ///
    /// Every trackpoint is assigned to the first lap whose time window
    /// contains it. Placeholder laps (no end time, or zero duration) are
    /// skipped. Fails when no lap remains, a lap has no trackpoints, or
    /// timestamps within a lap go backwards.
    pub fn build(records: Vec<RawRecord>) -> Result<Activity, MalformedInputError> {
        let mut raw_laps = Vec::new();
        let mut raw_points = Vec::new();
        let mut session = None;
        let mut file_id = None;
        let mut device_info = None;
        let mut recorded_calibration_factor = None;

        for record in records {
            match record {
                RawRecord::Trackpoint(point) => raw_points.push(point),
                RawRecord::Lap(lap) => raw_laps.push(lap),
                RawRecord::Session(raw) => {
                    session.get_or_insert(raw);
                }
                RawRecord::FileId(raw) => {
                    file_id.get_or_insert(raw);
                }
                RawRecord::DeviceInfo(raw) => {
                    device_info.get_or_insert(raw);
                }
                RawRecord::CalibrationFactor(factor) if factor.is_finite() && factor > 0.0 => {
                    recorded_calibration_factor = Some(factor);
                }
                RawRecord::CalibrationFactor(factor) => {
                    tracing::debug!(factor, "ignoring invalid calibration factor in file");
                }
            }
        }

        let mut windows: Vec<LapWindow> = Vec::with_capacity(raw_laps.len());
        let mut previous_end = DateTime::<Utc>::MIN_UTC;
        for summary in raw_laps {
            let Some(end) = summary.end_time else {
                tracing::debug!("skipping lap without end timestamp");
                continue;
            };
            let start = summary.start_time.unwrap_or(previous_end);
            if start == end {
                tracing::debug!(%start, "skipping zero-length lap");
                continue;
            }
            previous_end = end;
            windows.push(LapWindow {
                start,
                end,
                summary,
                trackpoints: Vec::new(),
            });
        }

        if windows.is_empty() {
            return Err(MalformedInputError::NoLaps);
        }

        let mut unassigned = 0usize;
        for point in raw_points {
            match windows
                .iter_mut()
                .find(|window| window.start <= point.timestamp && point.timestamp <= window.end)
            {
                Some(window) => window.trackpoints.push(point.into()),
                None => unassigned += 1,
            }
        }
        if unassigned > 0 {
            tracing::debug!(unassigned, "dropped trackpoints outside every lap");
        }

        for (lap_index, window) in windows.iter().enumerate() {
            if window.trackpoints.is_empty() {
                return Err(MalformedInputError::EmptyLap { lap_index });
            }
            if let Some(position) = window
                .trackpoints
                .windows(2)
                .position(|pair| pair[1].timestamp < pair[0].timestamp)
            {
                return Err(MalformedInputError::NonMonotonicTimestamp {
                    lap_index,
                    trackpoint_index: position + 1,
                });
            }
        }

        let start_time = session
            .as_ref()
            .and_then(|session: &RawSession| session.start_time)
            .unwrap_or(windows[0].start);

        let laps = windows
            .into_iter()
            .map(|window| Lap {
                start_time: window.start,
                end_time: window.end,
                summary: window.summary,
                trackpoints: window.trackpoints,
                manual_distance: None,
                gps_distance: None,
            })
            .collect();

        Ok(Activity {
            start_time,
            laps,
            session,
            device: device_info.or(file_id),
            recorded_calibration_factor,
            calibration: None,
        })
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn laps(&self) -> &[Lap] {
        &self.laps
    }

    pub(crate) fn laps_mut(&mut self) -> &mut [Lap] {
        &mut self.laps
    }

    pub fn session(&self) -> Option<&RawSession> {
        self.session.as_ref()
    }

    pub fn device(&self) -> Option<&RawDevice> {
        self.device.as_ref()
    }

    pub fn sport(&self) -> Option<&str> {
        self.session.as_ref().and_then(|session| session.sport.as_deref())
    }

    /// Footpod calibration factor found in the file, in percent.
    pub fn recorded_calibration_factor(&self) -> Option<f64> {
        self.recorded_calibration_factor
    }

    /// First recorded position, used to resolve the local timezone.
    pub fn starting_coordinate(&self) -> Option<Coordinate> {
        self.laps
            .iter()
            .flat_map(|lap| lap.trackpoints.iter())
            .find_map(Trackpoint::coordinate)
    }

    /// Sum of the defined lap GPS distances.
    pub fn gps_distance(&self) -> Option<f64> {
        sum_defined(self.laps.iter().map(Lap::gps_distance))
    }

    /// GPS distance over the laps that recorded footpod distance, so it can be
    /// compared with [`Activity::footpod_distance`]. Laps without GPS count
    /// with their footpod distance. `None` when none of these laps has GPS.
    pub fn reference_gps_distance(&self) -> Option<f64> {
        let laps: Vec<&Lap> = self
            .laps
            .iter()
            .filter(|lap| lap.footpod_distance().is_some())
            .collect();
        if !laps.iter().any(|lap| lap.gps_distance().is_some()) {
            return None;
        }
        sum_defined(laps.iter().map(|lap| lap.gps_distance().or(lap.footpod_distance())))
    }

    /// Sum of the lap footpod distances.
    pub fn footpod_distance(&self) -> Option<f64> {
        sum_defined(self.laps.iter().map(Lap::footpod_distance))
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.session
            .as_ref()
            .and_then(|session| session.total_timer_time)
            .unwrap_or_else(|| self.laps.iter().map(Lap::elapsed_seconds).sum())
    }

    pub fn calibration(&self) -> Option<&AppliedCalibration> {
        self.calibration.as_ref()
    }

    pub(crate) fn set_calibration(&mut self, calibration: AppliedCalibration) {
        self.calibration = Some(calibration);
    }

    /// Attach known lap distances in lap order; extra laps keep `None`.
    pub(crate) fn assign_manual_distances(&mut self, distances: &[f64]) {
        for (index, lap) in self.laps.iter_mut().enumerate() {
            lap.manual_distance = distances.get(index).copied();
        }
    }
}

fn sum_defined(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().fold(None, |total, value| Some(total.unwrap_or(0.0) + value))
}
