//! JSON documents addressed by JSON pointer.

use super::{line_ending, CheckOutcome, Enforcer, FixOutcome, Fixable};
use serde::Deserialize;
use serde_json::{Map, Value as Json};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
/// Passes when every pointer expression yields the expected value.
pub struct JsonValueEquals {
    pub expectations: Map<String, Json>,
}

impl JsonValueEquals {
    pub fn new<I, K>(expectations: I) -> Self
    where
        I: IntoIterator<Item = (K, Json)>,
        K: Into<String>,
    {
        Self {
            expectations: expectations
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        }
    }
}

/// Scalar text of a value; strings are rendered without quotes.
fn text(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Equal as JSON, or equal as text (`"1"` matches `1`).
fn matches(actual: &Json, expected: &Json) -> bool {
    actual == expected || text(actual) == text(expected)
}

fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Set the value at `pointer`, creating the last segment if it is missing.
/// Returns false when the parent does not exist or cannot hold the segment.
fn set_pointer(root: &mut Json, pointer: &str, value: Json) -> bool {
    if pointer.is_empty() {
        *root = value;
        return true;
    }
    let Some(split) = pointer.rfind('/') else {
        return false;
    };
    let (parent, last) = (&pointer[..split], unescape(&pointer[split + 1..]));
    match root.pointer_mut(parent) {
        Some(Json::Object(map)) => {
            map.insert(last, value);
            true
        }
        // Arrays: replace in range, append at the end or with `-`
        Some(Json::Array(items)) => match last.parse::<usize>() {
            Ok(i) if i < items.len() => {
                items[i] = value;
                true
            }
            Ok(i) if i == items.len() => {
                items.push(value);
                true
            }
            _ if last == "-" => {
                items.push(value);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

fn read_error(err: serde_json::Error) -> String {
    format!("Reading or parsing file resulted in error [{err}]")
}

impl Enforcer for JsonValueEquals {
    fn check(&self, content: &str) -> CheckOutcome {
        let root: Json = match serde_json::from_str(content) {
            Ok(root) => root,
            Err(err) => return CheckOutcome::failed(read_error(err)),
        };
        let messages = self
            .expectations
            .iter()
            .filter_map(|(pointer, expected)| match root.pointer(pointer) {
                None => Some(format!(
                    "Execution of pointer expression [{pointer}] yielded no result"
                )),
                Some(actual) if matches(actual, expected) => None,
                Some(actual) => Some(format!(
                    "Execution of pointer expression [{pointer}] yielded result [{}] which is not equal to [{}]",
                    text(actual),
                    text(expected)
                )),
            })
            .collect();
        CheckOutcome::from_messages(messages)
    }
}

impl Fixable for JsonValueEquals {
    fn fix(&self, content: &str) -> (Option<String>, FixOutcome) {
        let mut root: Json = match serde_json::from_str(content) {
            Ok(root) => root,
            Err(err) => return (None, FixOutcome::failure(read_error(err))),
        };
        let mut outcome = FixOutcome::fold_seed();
        for (pointer, expected) in &self.expectations {
            let current = root.pointer(pointer);
            if current.is_some_and(|actual| matches(actual, expected)) {
                outcome = outcome.combine(FixOutcome::no_updates());
                continue;
            }
            let missing = current.is_none();
            let step = if !set_pointer(&mut root, pointer, expected.clone()) {
                FixOutcome::failure(format!(
                    "Update not supported for pointer expression [{pointer}]"
                ))
            } else if missing {
                FixOutcome::updated(format!(
                    "Pointer expression [{pointer}] which was missing, has been set with value [{}]",
                    text(expected)
                ))
            } else {
                FixOutcome::updated(format!(
                    "Pointer expression [{pointer}] has been updated with value [{}]",
                    text(expected)
                ))
            };
            outcome = outcome.combine(step);
        }
        if !outcome.changed() {
            return (None, outcome);
        }
        match serde_json::to_string_pretty(&root) {
            Ok(mut rendered) => {
                rendered.push('\n');
                let ending = line_ending(content);
                if ending != "\n" {
                    rendered = rendered.replace('\n', ending);
                }
                (Some(rendered), outcome)
            }
            Err(err) => (None, FixOutcome::failure(read_error(err))),
        }
    }
}
