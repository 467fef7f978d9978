//! Correction for devices that record local wall time labelled as UTC.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use tzf_rs::DefaultFinder;

use crate::processing::records::{Coordinate, RawRecord};
use crate::processing::types::TimestampZone;

static FINDER: LazyLock<DefaultFinder> = LazyLock::new(DefaultFinder::new);

/// Maps a position to the IANA time zone it lies in.
pub trait TimezoneResolver {
    fn zone_at(&self, coordinate: Coordinate) -> Option<Tz>;
}

/// Time zone boundary lookup backed by the embedded `tzf-rs` polygons.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimezoneBoundaries;

impl TimezoneResolver for TimezoneBoundaries {
    fn zone_at(&self, coordinate: Coordinate) -> Option<Tz> {
        let name = FINDER.get_tz_name(coordinate.longitude, coordinate.latitude);
        name.parse::<Tz>().ok()
    }
}

#[derive(Debug, Clone, Copy)]
enum LocalZone {
    Fixed(FixedOffset),
    Named(Tz),
}

impl LocalZone {
    /// UTC offset in effect at the given wall-clock time.
    fn offset_at(self, local: NaiveDateTime) -> FixedOffset {
        match self {
            LocalZone::Fixed(offset) => offset,
            LocalZone::Named(zone) => zone
                .offset_from_local_datetime(&local)
                .earliest()
                // wall time skipped by a DST change
                .unwrap_or_else(|| zone.offset_from_utc_datetime(&local))
                .fix(),
        }
    }

    fn to_utc(self, recorded: DateTime<Utc>) -> DateTime<Utc> {
        let offset = self.offset_at(recorded.naive_utc());
        recorded - Duration::seconds(i64::from(offset.local_minus_utc()))
    }
}

/// Shift every timestamp from the recorded local time to UTC.
///
/// Does nothing for [`TimestampZone::Utc`]. For [`TimestampZone::LocalAuto`]
/// the zone is resolved from the first positioned trackpoint and each
/// timestamp is localized on its own, so DST changes inside the activity are
/// honoured. Without a position the timestamps are left unchanged.
///
/// Returns the offset in effect at the first trackpoint.
pub fn correct_timestamps(
    records: &mut [RawRecord],
    zone: TimestampZone,
    resolver: &dyn TimezoneResolver,
) -> Option<FixedOffset> {
    let local_zone = match zone {
        TimestampZone::Utc => return None,
        TimestampZone::Offset(offset) => LocalZone::Fixed(offset),
        TimestampZone::LocalAuto => {
            let coordinate = records.iter().find_map(|record| match record {
                RawRecord::Trackpoint(point) => point.coordinate,
                _ => None,
            });
            let Some(coordinate) = coordinate else {
                tracing::warn!("no position in activity; timestamps left unchanged");
                return None;
            };
            let Some(zone) = resolver.zone_at(coordinate) else {
                tracing::warn!(?coordinate, "could not resolve timezone; timestamps left unchanged");
                return None;
            };
            tracing::debug!(zone = zone.name(), "resolved timezone from first position");
            LocalZone::Named(zone)
        }
    };

    let first = records.iter().find_map(|record| match record {
        RawRecord::Trackpoint(point) => Some(point.timestamp),
        _ => None,
    });
    let offset = first.map(|timestamp| local_zone.offset_at(timestamp.naive_utc()));

    for record in records.iter_mut() {
        record.map_timestamps(|timestamp| local_zone.to_utc(timestamp));
    }
    tracing::info!(?offset, "converted local timestamps to UTC");
    offset
}
