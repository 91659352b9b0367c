//! Frame decoding for biosensor notification payloads.
//!
//! The device pushes Base64-encoded ASCII frames of comma-separated values
//! in fixed positional order `IR,RED[,SpO2[,HR[,TEMP]]]`. Trailing fields
//! are optional and default to 0 when absent.

use crate::sample::Sample;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

fn parse_channel(token: Option<&str>) -> i64 {
    token
        .and_then(|t| t.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

fn parse_temp(token: Option<&str>) -> f64 {
    token
        .and_then(|t| t.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Decode one raw notification payload into a [`Sample`].
///
/// Parsing is defensive: a token that fails to parse becomes 0 rather than
/// aborting the frame, since downstream consumers tolerate zero-valued
/// channels better than gaps. Returns `None` only when the payload holds no
/// usable frame at all (invalid Base64, non-UTF-8, or an empty decoded
/// string); the caller must then skip both buffers for this notification.
///
/// Never panics, whatever the input bytes are.
pub fn decode(raw: &[u8]) -> Option<Sample> {
    let bytes = STANDARD.decode(raw).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let tokens: Vec<&str> = text.split(',').collect();
    if tokens.iter().all(|t| t.trim().is_empty()) {
        return None;
    }

    Some(Sample::now(
        parse_channel(tokens.first().copied()),
        parse_channel(tokens.get(1).copied()),
        parse_channel(tokens.get(2).copied()),
        parse_channel(tokens.get(3).copied()),
        parse_temp(tokens.get(4).copied()),
    ))
}
