//! Plain-text enforcers: substrings, lines and whole-content comparison.

use super::params::{scalar_count, scalar_text};
use super::{rejoin, CheckOutcome, Enforcer, FixOutcome, Fixable};
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
/// Passes when the content matches a regular expression somewhere.
pub struct Contains {
    #[serde(deserialize_with = "scalar_text")]
    pub expected_substring: String,
}

impl Contains {
    pub fn new(expected_substring: impl Into<String>) -> Self {
        Self {
            expected_substring: expected_substring.into(),
        }
    }
}

impl Enforcer for Contains {
    fn check(&self, content: &str) -> CheckOutcome {
        match Regex::new(&self.expected_substring) {
            Ok(re) if re.is_match(content) => CheckOutcome::passed(),
            Ok(_) => CheckOutcome::failed(format!(
                "File does not contain the sub string [{}]",
                self.expected_substring
            )),
            Err(err) => CheckOutcome::failed(format!(
                "Invalid pattern [{}]: {err}",
                self.expected_substring
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
/// Passes when the literal substring does not occur.
pub struct NotContains {
    #[serde(deserialize_with = "scalar_text")]
    pub expected_substring: String,
}

impl NotContains {
    pub fn new(expected_substring: impl Into<String>) -> Self {
        Self {
            expected_substring: expected_substring.into(),
        }
    }
}

impl Enforcer for NotContains {
    fn check(&self, content: &str) -> CheckOutcome {
        if content.contains(&self.expected_substring) {
            CheckOutcome::failed(format!(
                "File does contain the sub string [{}]",
                self.expected_substring
            ))
        } else {
            CheckOutcome::passed()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
/// Passes when some line equals the expected line exactly.
pub struct ContainsLine {
    #[serde(deserialize_with = "scalar_text")]
    pub expected_line: String,
}

impl ContainsLine {
    pub fn new(expected_line: impl Into<String>) -> Self {
        Self {
            expected_line: expected_line.into(),
        }
    }
}

impl Enforcer for ContainsLine {
    fn check(&self, content: &str) -> CheckOutcome {
        if content.lines().any(|l| l == self.expected_line) {
            CheckOutcome::passed()
        } else {
            CheckOutcome::failed(format!(
                "File does not contain the line [{}]",
                self.expected_line
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
/// Passes when the line at a 1-based position equals the expected line.
pub struct ContainsLineAt {
    #[serde(deserialize_with = "scalar_text")]
    pub expected_line: String,
    #[serde(deserialize_with = "scalar_count")]
    pub expected_line_number: usize,
}

impl ContainsLineAt {
    pub fn new(expected_line: impl Into<String>, expected_line_number: usize) -> Self {
        Self {
            expected_line: expected_line.into(),
            expected_line_number,
        }
    }

    fn index(&self) -> Option<usize> {
        self.expected_line_number.checked_sub(1)
    }
}

impl Enforcer for ContainsLineAt {
    fn check(&self, content: &str) -> CheckOutcome {
        let found = self
            .index()
            .and_then(|i| content.lines().nth(i))
            .is_some_and(|l| l == self.expected_line);
        if found {
            CheckOutcome::passed()
        } else {
            CheckOutcome::failed(format!(
                "File does not contain the line [{}] at line number [{}]",
                self.expected_line, self.expected_line_number
            ))
        }
    }
}

impl Fixable for ContainsLineAt {
    fn fix(&self, content: &str) -> (Option<String>, FixOutcome) {
        let Some(index) = self.index() else {
            return (
                None,
                FixOutcome::failure("Line numbers start at [1], got [0]"),
            );
        };
        let mut lines: Vec<&str> = content.lines().collect();
        match lines.get(index) {
            Some(line) if *line == self.expected_line => (None, FixOutcome::no_updates()),
            Some(_) => {
                lines[index] = &self.expected_line;
                let updated = rejoin(&lines, content);
                (
                    Some(updated),
                    FixOutcome::updated(format!(
                        "File line number [{}] has been updated to value [{}]",
                        self.expected_line_number, self.expected_line
                    )),
                )
            }
            None => (
                None,
                FixOutcome::failure(format!(
                    "File has fewer than [{}] lines",
                    self.expected_line_number
                )),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
/// Passes when the content equals the expected content line by line.
pub struct ContentEquals {
    #[serde(deserialize_with = "scalar_text")]
    pub expected_file_contents: String,
}

impl ContentEquals {
    pub fn new(expected_file_contents: impl Into<String>) -> Self {
        Self {
            expected_file_contents: expected_file_contents.into(),
        }
    }
}

/// Line-wise comparison; line terminators and a final newline are ignored.
fn same_lines(a: &str, b: &str) -> bool {
    a.lines().eq(b.lines())
}

impl Enforcer for ContentEquals {
    fn check(&self, content: &str) -> CheckOutcome {
        if same_lines(content, &self.expected_file_contents) {
            CheckOutcome::passed()
        } else {
            CheckOutcome::failed("File contents do not equal that of the expected file contents")
        }
    }
}

impl Fixable for ContentEquals {
    fn fix(&self, content: &str) -> (Option<String>, FixOutcome) {
        if same_lines(content, &self.expected_file_contents) {
            return (None, FixOutcome::no_updates());
        }
        (
            Some(self.expected_file_contents.clone()),
            FixOutcome::updated("File contents have been replaced with the expected file contents"),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
/// Passes when the content differs from the given content.
pub struct ContentNotEquals {
    #[serde(deserialize_with = "scalar_text")]
    pub expected_file_contents: String,
}

impl ContentNotEquals {
    pub fn new(expected_file_contents: impl Into<String>) -> Self {
        Self {
            expected_file_contents: expected_file_contents.into(),
        }
    }
}

impl Enforcer for ContentNotEquals {
    fn check(&self, content: &str) -> CheckOutcome {
        if same_lines(content, &self.expected_file_contents) {
            CheckOutcome::failed("File contents equal that of the unwanted file contents")
        } else {
            CheckOutcome::passed()
        }
    }
}
