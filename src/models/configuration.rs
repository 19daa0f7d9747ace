//! Root configuration document: includes plus file protocols.

use super::protocol::Protocol;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
/// A parsed configuration document.
///
/// `config-locations` is read but never written back; it only drives
/// resolution of inherited documents.
pub struct Configuration {
    #[serde(
        default,
        rename = "config-locations",
        deserialize_with = "ordered_unique",
        skip_serializing
    )]
    pub include_locations: Vec<String>,
    #[serde(default, rename = "file-protocols")]
    pub rules: Vec<Protocol>,
}

impl Configuration {
    pub fn new(rules: Vec<Protocol>) -> Self {
        Self {
            include_locations: Vec::new(),
            rules,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.include_locations.is_empty() && self.rules.is_empty()
    }
}

/// Deserialize a list while dropping repeated entries, keeping first-seen order.
fn ordered_unique<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default();
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for loc in raw {
        if !out.contains(&loc) {
            out.push(loc);
        }
    }
    Ok(out)
}
