//! Garmin Training Center (TCX v2) serialization.

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::processing::overrides::{LapOverrides, RecordOverrides};
use crate::processing::records::RawDevice;
use crate::processing::report::{ActivityReport, LapReport};
use crate::processing::track::{Activity, Lap, Trackpoint};

const TCD_NAMESPACE: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";
const EXTENSION_NAMESPACE: &str = "http://www.garmin.com/xmlschemas/ActivityExtension/v2";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://www.garmin.com/xmlschemas/ActivityExtension/v2 \
    http://www.garmin.com/xmlschemas/ActivityExtensionv2.xsd \
    http://www.garmin.com/xmlschemas/FatCalories/v1 \
    http://www.garmin.com/xmlschemas/fatcalorieextensionv1.xsd \
    http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2 \
    http://www.garmin.com/xmlschemas/TrainingCenterDatabasev2.xsd";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcxSport {
    Running,
    Biking,
    Other,
}

impl TcxSport {
    pub fn from_fit(sport: Option<&str>) -> Self {
        match sport {
            Some("running") => TcxSport::Running,
            Some("cycling") => TcxSport::Biking,
            _ => TcxSport::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TcxSport::Running => "Running",
            TcxSport::Biking => "Biking",
            TcxSport::Other => "Other",
        }
    }
}

pub fn intensity(fit_intensity: Option<&str>) -> &'static str {
    match fit_intensity {
        Some("rest") => "Resting",
        _ => "Active",
    }
}

pub fn trigger_method(fit_trigger: Option<&str>) -> &'static str {
    match fit_trigger {
        Some("time") => "Time",
        Some("distance") => "Distance",
        Some("heart_rate") => "HeartRate",
        Some("position_start" | "position_lap" | "position_waypoint" | "position_marked") => {
            "Location"
        }
        _ => "Manual",
    }
}

/// Serialize the activity with the emitted streams and the report notes.
pub fn write_tcx(
    activity: &Activity,
    report: &ActivityReport,
    overrides: &[LapOverrides],
) -> Result<Vec<u8>, quick_xml::Error> {
    let mut document = TcxDocument {
        writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        sport: TcxSport::from_fit(activity.sport()),
    };

    document
        .writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    document.open(
        "TrainingCenterDatabase",
        &[
            ("xmlns", TCD_NAMESPACE),
            ("xmlns:xsi", XSI_NAMESPACE),
            ("xsi:schemaLocation", SCHEMA_LOCATION),
        ],
    )?;
    document.open("Activities", &[])?;
    let sport = document.sport.as_str();
    document.open("Activity", &[("Sport", sport)])?;
    document.leaf("Id", &iso_z(activity.start_time()))?;

    let empty = LapOverrides::default();
    for (index, lap) in activity.laps().iter().enumerate() {
        let emitted = overrides.get(index).unwrap_or(&empty);
        document.lap(lap, report.laps.get(index), emitted)?;
    }

    document.leaf("Notes", &report.notes)?;
    if let Some(device) = activity.device() {
        document.creator(device)?;
    }
    document.close("Activity")?;
    document.close("Activities")?;
    document.author()?;
    document.close("TrainingCenterDatabase")?;

    Ok(document.writer.into_inner())
}

struct TcxDocument {
    writer: Writer<Vec<u8>>,
    sport: TcxSport,
}

impl TcxDocument {
    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), quick_xml::Error> {
        let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Start(element))
    }

    fn close(&mut self, name: &str) -> Result<(), quick_xml::Error> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))
    }

    fn leaf(&mut self, name: &str, text: &str) -> Result<(), quick_xml::Error> {
        self.open(name, &[])?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn heart_rate(&mut self, name: &str, bpm: u8) -> Result<(), quick_xml::Error> {
        self.open(name, &[("xsi:type", "HeartRateInBeatsPerMinute_t")])?;
        self.leaf("Value", &bpm.to_string())?;
        self.close(name)
    }

    fn lap(
        &mut self,
        lap: &Lap,
        report: Option<&LapReport>,
        emitted: &LapOverrides,
    ) -> Result<(), quick_xml::Error> {
        let summary = lap.summary();

        let start_time = iso_z(lap.start_time());
        self.open("Lap", &[("StartTime", start_time.as_str())])?;
        self.leaf("TotalTimeSeconds", &format!("{:.1}", lap.elapsed_seconds()))?;
        self.leaf(
            "DistanceMeters",
            &format!("{:.2}", emitted.distance_meters.unwrap_or(0.0)),
        )?;
        if let Some(max_speed) = emitted.max_speed {
            self.leaf("MaximumSpeed", &format!("{max_speed:.3}"))?;
        }
        self.leaf("Calories", &summary.total_calories.unwrap_or(0).to_string())?;
        if let Some(bpm) = summary.avg_heart_rate {
            self.heart_rate("AverageHeartRateBpm", bpm)?;
        }
        if let Some(bpm) = summary.max_heart_rate {
            self.heart_rate("MaximumHeartRateBpm", bpm)?;
        }
        self.leaf("Intensity", intensity(summary.intensity.as_deref()))?;
        if let (TcxSport::Biking, Some(cadence)) = (self.sport, summary.avg_cadence) {
            self.leaf("Cadence", &cadence.to_string())?;
        }
        self.leaf("TriggerMethod", trigger_method(summary.lap_trigger.as_deref()))?;

        self.open("Track", &[])?;
        let unchanged = RecordOverrides::default();
        for (index, point) in lap.trackpoints().iter().enumerate() {
            self.trackpoint(point, emitted.records.get(index).unwrap_or(&unchanged))?;
        }
        self.close("Track")?;

        if let Some(report) = report {
            self.leaf("Notes", &report.notes)?;
        }

        let max_cadence = summary.max_cadence.filter(|_| self.sport != TcxSport::Other);
        let avg_run_cadence = summary.avg_cadence.filter(|_| self.sport == TcxSport::Running);
        if emitted.avg_speed.is_some() || avg_run_cadence.is_some() || max_cadence.is_some() {
            self.open("Extensions", &[])?;
            self.open("LX", &[("xmlns", EXTENSION_NAMESPACE)])?;
            if let Some(avg_speed) = emitted.avg_speed {
                self.leaf("AvgSpeed", &format!("{avg_speed:.3}"))?;
            }
            if let Some(cadence) = avg_run_cadence {
                self.leaf("AvgRunCadence", &cadence.to_string())?;
            }
            if let Some(cadence) = max_cadence {
                let name = match self.sport {
                    TcxSport::Biking => "MaxBikeCadence",
                    _ => "MaxRunCadence",
                };
                self.leaf(name, &cadence.to_string())?;
            }
            self.close("LX")?;
            self.close("Extensions")?;
        }

        self.close("Lap")
    }

    fn trackpoint(
        &mut self,
        point: &Trackpoint,
        emitted: &RecordOverrides,
    ) -> Result<(), quick_xml::Error> {
        self.open("Trackpoint", &[])?;
        self.leaf("Time", &iso_z(point.timestamp()))?;
        if let Some(coordinate) = point.coordinate() {
            self.open("Position", &[])?;
            self.leaf("LatitudeDegrees", &format!("{:.6}", coordinate.latitude))?;
            self.leaf("LongitudeDegrees", &format!("{:.6}", coordinate.longitude))?;
            self.close("Position")?;
        }
        if let Some(altitude) = point.altitude() {
            self.leaf("AltitudeMeters", &format!("{altitude:.1}"))?;
        }
        if let Some(distance) = emitted.distance {
            self.leaf("DistanceMeters", &format!("{distance:.2}"))?;
        }
        if let Some(bpm) = point.heart_rate() {
            self.heart_rate("HeartRateBpm", bpm)?;
        }

        let cadence = point.cadence();
        if let (TcxSport::Biking, Some(cadence)) = (self.sport, cadence) {
            self.leaf("Cadence", &cadence.to_string())?;
        }
        if emitted.speed.is_some() || cadence.is_some() {
            let sensor = match self.sport {
                TcxSport::Running if cadence.is_some() => Some("Footpod"),
                TcxSport::Biking if cadence.is_some() => Some("Bike"),
                _ => None,
            };
            let mut attributes = vec![("xmlns", EXTENSION_NAMESPACE)];
            attributes.extend(sensor.map(|sensor| ("CadenceSensor", sensor)));

            self.open("Extensions", &[])?;
            self.open("TPX", &attributes)?;
            if let Some(speed) = emitted.speed {
                self.leaf("Speed", &format!("{speed:.3}"))?;
            }
            if let (TcxSport::Running, Some(cadence)) = (self.sport, cadence) {
                self.leaf("RunCadence", &cadence.to_string())?;
            }
            self.close("TPX")?;
            self.close("Extensions")?;
        }

        self.close("Trackpoint")
    }

    fn creator(&mut self, device: &RawDevice) -> Result<(), quick_xml::Error> {
        let manufacturer = device.manufacturer.as_deref().unwrap_or("unknown");
        let name = match device.product_name.as_deref() {
            Some(product) => format!("{manufacturer} {product}"),
            None => manufacturer.to_string(),
        };
        // Garmin product ids only mean something for Garmin devices.
        let product_id = if manufacturer.eq_ignore_ascii_case("garmin") {
            device.product_id.unwrap_or(0)
        } else {
            0
        };

        self.open("Creator", &[("xsi:type", "Device_t")])?;
        self.leaf("Name", &name)?;
        self.leaf("UnitId", &device.serial_number.unwrap_or(0).to_string())?;
        self.leaf("ProductID", &product_id.to_string())?;
        self.version("0", "0")?;
        self.close("Creator")
    }

    fn author(&mut self) -> Result<(), quick_xml::Error> {
        self.open("Author", &[("xsi:type", "Application_t")])?;
        self.leaf("Name", "RustyTcx")?;
        self.open("Build", &[])?;
        self.version(env!("CARGO_PKG_VERSION_MAJOR"), env!("CARGO_PKG_VERSION_MINOR"))?;
        self.close("Build")?;
        self.leaf("LangID", "en")?;
        self.leaf("PartNumber", "000-00000-00")?;
        self.close("Author")
    }

    fn version(&mut self, major: &str, minor: &str) -> Result<(), quick_xml::Error> {
        self.open("Version", &[])?;
        self.leaf("VersionMajor", major)?;
        self.leaf("VersionMinor", minor)?;
        self.leaf("BuildMajor", "0")?;
        self.leaf("BuildMinor", "0")?;
        self.close("Version")
    }
}

fn iso_z(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
