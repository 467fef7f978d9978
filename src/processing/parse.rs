use chrono::{DateTime, Utc};
use fitparser::Value;
use fitparser::profile::MesgNum;

use crate::processing::records::{
    Coordinate, RawDevice, RawLap, RawRecord, RawSession, RawTrackpoint,
};
use crate::processing::types::FitProcessError;

const SEMICIRCLES_TO_DEGREES: f64 = 180.0 / 2_147_483_648.0;

/// Decode a FIT file (CRC checked by `fitparser`) into typed records.
///
/// Messages the converter has no use for are dropped here.
pub fn parse_fit(bytes: &[u8]) -> Result<Vec<RawRecord>, FitProcessError> {
    let messages =
        fitparser::from_bytes(bytes).map_err(|err| FitProcessError::ParseError(err.to_string()))?;

    let records: Vec<RawRecord> = messages
        .iter()
        .filter_map(|message| {
            let fields = Fields(
                message
                    .fields()
                    .iter()
                    .map(|field| (field.name(), field.value()))
                    .collect(),
            );
            convert_message(message.kind(), &fields)
        })
        .collect();

    tracing::debug!(messages = messages.len(), records = records.len(), "decoded FIT file");
    Ok(records)
}

/// Named field values of a single FIT message.
pub(crate) struct Fields<'a>(pub(crate) Vec<(&'a str, &'a Value)>);

impl<'a> Fields<'a> {
    fn get(&self, name: &str) -> Option<&'a Value> {
        self.0
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| *value)
    }

    fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(value_to_f64)
    }

    /// The enhanced field when present, the plain one otherwise.
    fn enhanced(&self, name: &str) -> Option<f64> {
        self.number(&format!("enhanced_{name}"))
            .or_else(|| self.number(name))
    }

    fn byte(&self, name: &str) -> Option<u8> {
        self.number(name).and_then(|value| u8::try_from(value.round() as i64).ok())
    }

    fn short(&self, name: &str) -> Option<u16> {
        self.number(name).and_then(|value| u16::try_from(value.round() as i64).ok())
    }

    fn text(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::String(text) => Some(text.clone()),
            _ => None,
        }
    }

    fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.get(name)? {
            Value::Timestamp(timestamp) => Some(timestamp.with_timezone(&Utc)),
            _ => None,
        }
    }

    fn coordinate(&self) -> Option<Coordinate> {
        let latitude = self.number("position_lat")? * SEMICIRCLES_TO_DEGREES;
        let longitude = self.number("position_long")? * SEMICIRCLES_TO_DEGREES;
        (latitude.abs() <= 90.0 && longitude.abs() <= 180.0)
            .then(|| Coordinate::new(latitude, longitude))
    }
}

pub(crate) fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float32(value) => Some(f64::from(*value)),
        Value::Float64(value) => Some(*value),
        Value::SInt8(value) => Some(f64::from(*value)),
        Value::SInt16(value) => Some(f64::from(*value)),
        Value::SInt32(value) => Some(f64::from(*value)),
        Value::SInt64(value) => Some(*value as f64),
        Value::Byte(value) | Value::UInt8(value) | Value::UInt8z(value) => Some(f64::from(*value)),
        Value::UInt16(value) | Value::UInt16z(value) => Some(f64::from(*value)),
        Value::UInt32(value) | Value::UInt32z(value) => Some(f64::from(*value)),
        Value::UInt64(value) | Value::UInt64z(value) => Some(*value as f64),
        _ => None,
    }
    .filter(|value| value.is_finite())
}

pub(crate) fn convert_message(kind: MesgNum, fields: &Fields<'_>) -> Option<RawRecord> {
    match kind {
        MesgNum::Record => convert_record(fields).map(RawRecord::Trackpoint),
        MesgNum::Lap => Some(RawRecord::Lap(convert_lap(fields))),
        MesgNum::Session => Some(RawRecord::Session(RawSession {
            sport: fields.text("sport"),
            start_time: fields.timestamp("start_time"),
            total_distance: fields.number("total_distance"),
            total_timer_time: fields.number("total_timer_time"),
            num_laps: fields.short("num_laps"),
        })),
        MesgNum::FileId => Some(RawRecord::FileId(convert_device(fields))),
        MesgNum::DeviceInfo if is_creator(fields) => {
            Some(RawRecord::DeviceInfo(convert_device(fields)))
        }
        MesgNum::SdmProfile => fields
            .number("sdm_cal_factor")
            .map(RawRecord::CalibrationFactor),
        _ => None,
    }
}

fn convert_record(fields: &Fields<'_>) -> Option<RawTrackpoint> {
    let Some(timestamp) = fields.timestamp("timestamp") else {
        tracing::debug!("dropping record message without timestamp");
        return None;
    };

    Some(RawTrackpoint {
        timestamp,
        coordinate: fields.coordinate(),
        altitude: fields.enhanced("altitude"),
        distance: fields.number("distance"),
        speed: fields.enhanced("speed"),
        heart_rate: fields.byte("heart_rate"),
        cadence: fields.byte("cadence"),
    })
}

fn convert_lap(fields: &Fields<'_>) -> RawLap {
    RawLap {
        start_time: fields.timestamp("start_time"),
        end_time: fields.timestamp("timestamp"),
        total_elapsed_time: fields.number("total_elapsed_time"),
        total_distance: fields.number("total_distance"),
        max_speed: fields.enhanced("max_speed"),
        avg_speed: fields.enhanced("avg_speed"),
        total_calories: fields.short("total_calories"),
        avg_heart_rate: fields.byte("avg_heart_rate"),
        max_heart_rate: fields.byte("max_heart_rate"),
        avg_cadence: fields.byte("avg_cadence").or_else(|| fields.byte("avg_running_cadence")),
        max_cadence: fields.byte("max_cadence").or_else(|| fields.byte("max_running_cadence")),
        intensity: fields.text("intensity"),
        lap_trigger: fields.text("lap_trigger"),
    }
}

fn convert_device(fields: &Fields<'_>) -> RawDevice {
    RawDevice {
        manufacturer: fields.text("manufacturer"),
        product_name: fields
            .text("product_name")
            .or_else(|| fields.text("garmin_product")),
        product_id: fields.short("product"),
        serial_number: fields
            .number("serial_number")
            .and_then(|value| u32::try_from(value as i64).ok()),
    }
}

/// Only the recording device itself, not paired sensors.
fn is_creator(fields: &Fields<'_>) -> bool {
    match fields.get("device_index") {
        None => true,
        Some(Value::String(index)) => index == "creator",
        Some(value) => value_to_f64(value) == Some(0.0),
    }
}
