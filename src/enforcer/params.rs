//! Lenient parameter readers.
//!
//! Configuration authors write `expected-property-value: 2.0` without quotes;
//! YAML hands that over as a number, so text parameters take any scalar.

use serde::de::Error;
use serde::{Deserialize, Deserializer};
use serde_json::Value as Json;

/// Any scalar as text: `2.0` reads as `"2.0"`, `true` as `"true"`.
pub(crate) fn scalar_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Json::deserialize(deserializer)? {
        Json::String(s) => Ok(s),
        Json::Number(n) => Ok(n.to_string()),
        Json::Bool(b) => Ok(b.to_string()),
        Json::Null => Err(D::Error::custom("invalid type: null, expected a string")),
        other => Err(D::Error::custom(format!(
            "invalid type: {other}, expected a string"
        ))),
    }
}

/// A non-negative integer, also accepted as a numeric string (`"3"`).
pub(crate) fn scalar_count<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Json::deserialize(deserializer)?;
    let parsed = match &value {
        Json::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Json::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        D::Error::custom(format!(
            "invalid value: {value}, expected a non-negative integer"
        ))
    })
}
