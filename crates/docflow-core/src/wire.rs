//! Lenient decoding helpers for numbers the backend emits as floats.

use serde::{Deserialize, Deserializer};

fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        0
    } else {
        value.round().clamp(0.0, 100.0) as u8
    }
}

/// Percentage in 0..=100, accepting integers or floats; missing/null is 0.
pub(crate) fn percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?
        .map(clamp_percent)
        .unwrap_or(0))
}

/// Optional percentage in 0..=100, accepting integers or floats.
pub(crate) fn opt_percent<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u8>, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.map(clamp_percent))
}

/// Non-negative count of seconds, accepting integers or floats.
pub(crate) fn opt_seconds<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u64>, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.map(|v| v.max(0.0).round() as u64))
}

/// Non-negative count of seconds; missing/null is 0.
pub(crate) fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(opt_seconds(deserializer)?.unwrap_or(0))
}
