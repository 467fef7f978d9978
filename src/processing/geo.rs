use geo::{Distance, Haversine, Point};

use crate::processing::records::Coordinate;

/// Distance in meters between two positions.
pub trait GeoDistance {
    fn distance(&self, from: Coordinate, to: Coordinate) -> f64;
}

/// Great-circle distance on a spherical Earth (mean radius 6,371,008.8 m).
#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineDistance;

impl GeoDistance for HaversineDistance {
    fn distance(&self, from: Coordinate, to: Coordinate) -> f64 {
        let from = Point::new(from.longitude, from.latitude);
        let to = Point::new(to.longitude, to.latitude);
        Haversine::distance(from, to)
    }
}
