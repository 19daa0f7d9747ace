//! `key=value` properties files.

use super::params::scalar_text;
use super::{line_ending, rejoin, CheckOutcome, Enforcer, FixOutcome, Fixable};
use serde::Deserialize;

/// One assignment found in a properties file.
struct Assignment<'a> {
    line: usize,
    key: &'a str,
    value: &'a str,
    /// Byte offset inside the line where the value starts.
    value_start: usize,
}

fn parse_line(index: usize, line: &str) -> Option<Assignment<'_>> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
        return None;
    }
    let key_end = trimmed
        .find(|c: char| c == '=' || c == ':' || c.is_whitespace())
        .unwrap_or(trimmed.len());
    let key = &trimmed[..key_end];

    let rest = &trimmed[key_end..];
    let after_ws = rest.trim_start();
    let after_sep = match after_ws.chars().next() {
        Some(sep @ ('=' | ':')) => after_ws[sep.len_utf8()..].trim_start(),
        _ => after_ws,
    };
    let value_start = line.len() - after_sep.len();
    Some(Assignment {
        line: index,
        key,
        value: after_sep.trim_end(),
        value_start,
    })
}

/// The effective (last) assignment of `name`.
fn lookup<'a>(lines: &[&'a str], name: &str) -> Option<Assignment<'a>> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(i, l)| parse_line(i, *l))
        .filter(|a| a.key == name)
        .last()
}

fn is_null(value: &str) -> bool {
    value.eq_ignore_ascii_case("null")
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
/// Passes when a property is set to the expected value.
pub struct StringPropertyEquals {
    #[serde(deserialize_with = "scalar_text")]
    pub property_name: String,
    #[serde(deserialize_with = "scalar_text")]
    pub expected_property_value: String,
}

impl StringPropertyEquals {
    pub fn new(property_name: impl Into<String>, expected_property_value: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            expected_property_value: expected_property_value.into(),
        }
    }
}

impl Enforcer for StringPropertyEquals {
    fn check(&self, content: &str) -> CheckOutcome {
        let lines: Vec<&str> = content.lines().collect();
        match lookup(&lines, &self.property_name) {
            None => CheckOutcome::failed(format!("Property [{}] is missing", self.property_name)),
            Some(a) if is_null(a.value) => {
                CheckOutcome::failed(format!("Property [{}] is null", self.property_name))
            }
            Some(a) if a.value == self.expected_property_value => CheckOutcome::passed(),
            Some(a) => CheckOutcome::failed(format!(
                "Property [{}] with value [{}] does not equal [{}]",
                self.property_name, a.value, self.expected_property_value
            )),
        }
    }
}

impl Fixable for StringPropertyEquals {
    fn fix(&self, content: &str) -> (Option<String>, FixOutcome) {
        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        let borrowed: Vec<&str> = content.lines().collect();

        let outcome = match lookup(&borrowed, &self.property_name) {
            Some(a) if a.value == self.expected_property_value => {
                return (None, FixOutcome::no_updates())
            }
            Some(a) => {
                let rewritten = format!(
                    "{}{}",
                    &borrowed[a.line][..a.value_start],
                    self.expected_property_value
                );
                let message = format!(
                    "Property [{}] with value [{}] has been updated to value [{}]",
                    self.property_name, a.value, self.expected_property_value
                );
                lines[a.line] = rewritten;
                FixOutcome::updated(message)
            }
            None => {
                lines.push(format!(
                    "{}={}",
                    self.property_name, self.expected_property_value
                ));
                FixOutcome::updated(format!(
                    "Property [{}] has been added with value [{}]",
                    self.property_name, self.expected_property_value
                ))
            }
        };

        // an empty file gets a terminated first line
        let updated = if content.is_empty() {
            format!("{}{}", lines.join(""), line_ending(content))
        } else {
            rejoin(&lines, content)
        };
        (Some(updated), outcome)
    }
}
