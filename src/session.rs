//! Monitoring session metadata.

use chrono::{DateTime, Local};
use serde::Serialize;

/// Metadata binding all samples collected during one continuous connection.
///
/// Created exactly once per successful connect, immutable for its lifetime,
/// and destroyed when the connection ends by any path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub device_id: String,
    pub subject_id: String,
    /// Connection date, `YYYYMMDD`.
    pub start_date: String,
    /// Connection time, `HHMMSS`.
    pub start_time: String,
}

impl Session {
    pub fn begin(
        device_id: impl Into<String>,
        subject_id: impl Into<String>,
        at: DateTime<Local>,
    ) -> Self {
        Session {
            device_id: device_id.into(),
            subject_id: subject_id.into(),
            start_date: at.format("%Y%m%d").to_string(),
            start_time: at.format("%H%M%S").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_begin_formats_start_date_and_time() {
        let at = Local
            .with_ymd_and_hms(2025, 5, 12, 14, 3, 22)
            .single()
            .unwrap();
        let session = Session::begin("dev-1", "pet-7", at);
        assert_eq!(session.device_id, "dev-1");
        assert_eq!(session.subject_id, "pet-7");
        assert_eq!(session.start_date, "20250512");
        assert_eq!(session.start_time, "140322");
    }

    #[test]
    fn test_begin_zero_pads_fields() {
        let at = Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).single().unwrap();
        let session = Session::begin("dev-1", "pet-7", at);
        assert_eq!(session.start_date, "20250102");
        assert_eq!(session.start_time, "030405");
    }
}
