//! Forgiving decoders for numeric fields that browsers send as JS numbers.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// An integer, saturated to `i64`. Fractions, strings and other values
/// decode as `None`.
pub fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_u64().map(|_| i64::MAX)),
        _ => None,
    })
}

/// Any JSON number, truncated toward zero and saturated to `i64`.
/// Non-numbers decode as `None`.
pub fn number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    })
}
