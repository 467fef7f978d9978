use crate::processing::geo::GeoDistance;
use crate::processing::records::Coordinate;
use crate::processing::track::{Activity, Lap};

/// Recomputes GPS cumulative distance and speed for every trackpoint.
///
/// The streams are always computed so the report can compare them against the
/// footpod; whether they replace the emitted streams is decided later.
pub struct RecalcEngine<'g, G: GeoDistance + ?Sized> {
    geo: &'g G,
}

impl<'g, G: GeoDistance + ?Sized> RecalcEngine<'g, G> {
    pub fn new(geo: &'g G) -> Self {
        Self { geo }
    }

    pub fn run(&self, activity: &mut Activity) {
        for lap in activity.laps_mut() {
            self.recalculate_lap(lap);
        }
    }

    /// Walk the lap in order, accumulating distance only between consecutive
    /// positioned points. Points without a position, and the first point after
    /// a gap, carry the last known distance and speed forward.
    pub fn recalculate_lap(&self, lap: &mut Lap) {
        let mut previous: Option<(Coordinate, f64)> = None;
        let mut cumulative: Option<f64> = None;
        let mut speed: Option<f64> = None;
        let mut positioned = 0usize;

        for point in lap.trackpoints_mut() {
            let timestamp = point.timestamp().timestamp_millis() as f64 / 1000.0;

            match (point.coordinate(), previous) {
                (Some(coordinate), Some((last_coordinate, last_timestamp))) => {
                    let segment = self.geo.distance(last_coordinate, coordinate);
                    cumulative = Some(cumulative.unwrap_or(0.0) + segment);
                    let elapsed = timestamp - last_timestamp;
                    if elapsed > 0.0 {
                        speed = Some(segment / elapsed);
                    }
                    previous = Some((coordinate, timestamp));
                    positioned += 1;
                }
                (Some(coordinate), None) => {
                    cumulative.get_or_insert(0.0);
                    previous = Some((coordinate, timestamp));
                    positioned += 1;
                }
                (None, _) => {
                    previous = None;
                }
            }

            point.set_gps(cumulative, speed);
        }

        lap.set_gps_distance(if positioned >= 2 { cumulative } else { None });
    }
}
