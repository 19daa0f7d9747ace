//! Alias → factory table for turning raw checks into enforcers.

use super::{
    Contains, ContainsLine, ContainsLineAt, ContentEquals, ContentNotEquals, FileEnforcer,
    Fixable, JsonValueEquals, NotContains, StringPropertyEquals,
};
use crate::error::RuleParseError;
use crate::models::protocol::RawCheck;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;

/// Discriminator key naming the enforcer type inside a raw check.
pub const ENFORCER_KEY: &str = "enforcer";

type Factory = fn(Json) -> Result<FileEnforcer, serde_json::Error>;

fn build<T>(params: Json) -> Result<FileEnforcer, serde_json::Error>
where
    T: DeserializeOwned + Into<FileEnforcer>,
{
    serde_json::from_value::<T>(params).map(Into::into)
}

static BUILTIN: &[(&str, Factory)] = &[
    ("contains", build::<Contains> as Factory),
    ("not-contains", build::<NotContains> as Factory),
    ("contains-line", build::<ContainsLine> as Factory),
    ("contains-line-at", build::<ContainsLineAt> as Factory),
    ("content-equals", build::<ContentEquals> as Factory),
    ("content-not-equals", build::<ContentNotEquals> as Factory),
    ("string-property-equals", build::<StringPropertyEquals> as Factory),
    ("json-value-equals", build::<JsonValueEquals> as Factory),
];

#[derive(Debug, Clone, Copy)]
/// Immutable registry of enforcer factories.
pub struct EnforcerRegistry {
    factories: &'static [(&'static str, Factory)],
}

impl Default for EnforcerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl EnforcerRegistry {
    pub fn builtin() -> Self {
        Self {
            factories: BUILTIN,
        }
    }

    pub fn aliases(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.iter().map(|(alias, _)| *alias)
    }

    fn factory(&self, alias: &str) -> Option<Factory> {
        self.factories
            .iter()
            .find(|(known, _)| *known == alias)
            .map(|(_, f)| *f)
    }

    /// Build an enforcer from a raw check.
    ///
    /// The remaining keys after the discriminator are the parameters; unknown
    /// or missing parameters and type mismatches are rejected.
    pub fn parse(&self, raw: &RawCheck) -> Result<FileEnforcer, RuleParseError> {
        let alias = match raw.get(ENFORCER_KEY) {
            Some(Json::String(s)) => s.as_str(),
            Some(other) => {
                return Err(RuleParseError::InvalidParameters {
                    alias: other.to_string(),
                    message: format!("`{ENFORCER_KEY}` must be a string"),
                })
            }
            None => {
                return Err(RuleParseError::InvalidParameters {
                    alias: String::new(),
                    message: format!("missing field `{ENFORCER_KEY}`"),
                })
            }
        };
        let factory = self
            .factory(alias)
            .ok_or_else(|| RuleParseError::UnknownType {
                alias: alias.to_string(),
            })?;

        // Strip the discriminator so deny_unknown_fields sees only parameters
        let params: serde_json::Map<String, Json> = raw
            .iter()
            .filter(|(k, _)| k.as_str() != ENFORCER_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let invalid = |message: String| RuleParseError::InvalidParameters {
            alias: alias.to_string(),
            message,
        };
        let enforcer = factory(Json::Object(params)).map_err(|e| invalid(e.to_string()))?;
        enforcer.validate().map_err(invalid)?;
        Ok(enforcer)
    }

    /// Capability query: the resolver view of an enforcer, if it has one.
    pub fn as_fixable<'a>(&self, enforcer: &'a FileEnforcer) -> Option<&'a dyn Fixable> {
        enforcer.as_fixable()
    }
}
