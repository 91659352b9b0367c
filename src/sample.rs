//! Decoded biosensor sample type.

use chrono::{DateTime, Local};
use serde::Serialize;

/// One decoded physiological reading.
///
/// Field semantics follow the device firmware's frame layout:
/// - `ir` / `red`: raw photoplethysmography channel counts
/// - `spo2`: derived oxygen saturation in percent
/// - `hr`: heart rate in beats per minute
/// - `temp`: body temperature in degrees Celsius
///
/// A sample is immutable once created. The chart buffer and the accumulator
/// each receive their own derived value, never a shared reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Wall-clock capture time with millisecond precision.
    pub timestamp: String,
    pub ir: i64,
    pub red: i64,
    pub spo2: i64,
    pub hr: i64,
    pub temp: f64,
}

impl Sample {
    /// Capture timestamp format, e.g. `0512-14:03:22.481`.
    pub const TIMESTAMP_FORMAT: &'static str = "%m%d-%H:%M:%S%.3f";

    /// Build a sample stamped with the current local time.
    pub fn now(ir: i64, red: i64, spo2: i64, hr: i64, temp: f64) -> Self {
        Self::at(Local::now(), ir, red, spo2, hr, temp)
    }

    /// Build a sample stamped with a given capture time.
    pub fn at(at: DateTime<Local>, ir: i64, red: i64, spo2: i64, hr: i64, temp: f64) -> Self {
        Sample {
            timestamp: at.format(Self::TIMESTAMP_FORMAT).to_string(),
            ir,
            red,
            spo2,
            hr,
            temp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_has_millisecond_precision() {
        let at = Local
            .with_ymd_and_hms(2025, 5, 12, 14, 3, 22)
            .single()
            .unwrap()
            + chrono::Duration::milliseconds(481);
        let sample = Sample::at(at, 1000, 2000, 95, 72, 38.5);
        assert_eq!(sample.timestamp, "0512-14:03:22.481");
    }

    #[test]
    fn test_serializes_with_channel_names() {
        let at = Local.with_ymd_and_hms(2025, 5, 12, 14, 3, 22).single().unwrap();
        let sample = Sample::at(at, 1000, 2000, 95, 72, 38.5);
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["ir"], 1000);
        assert_eq!(json["red"], 2000);
        assert_eq!(json["spo2"], 95);
        assert_eq!(json["hr"], 72);
        assert_eq!(json["temp"], 38.5);
        assert!(json["timestamp"].is_string());
    }
}
