use crate::sample::Sample;
use crate::session::Session;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{Local, TimeZone};

/// Build a sample whose IR channel doubles as a sequence marker.
///
/// Tests can override just the fields they care about.
pub fn sample(ir: i64) -> Sample {
    Sample {
        timestamp: format!("0512-14:03:22.{:03}", ir.rem_euclid(1000)),
        ir,
        red: ir * 2,
        spo2: 95,
        hr: 72,
        temp: 38.5,
    }
}

/// A stable session for unit tests.
pub fn test_session() -> Session {
    let at = Local
        .with_ymd_and_hms(2025, 5, 12, 14, 3, 22)
        .single()
        .unwrap();
    Session::begin("dev-1", "pet-7", at)
}

/// Encode an ASCII frame the way the device firmware does.
pub fn encode_frame(frame: &str) -> Vec<u8> {
    STANDARD.encode(frame).into_bytes()
}
