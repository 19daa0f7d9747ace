//! Process exit statuses.

use crate::error::EngineError;
use crate::result::{FixVerdict, ScanVerdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// The repository violates at least one failing protocol, or fixes failed.
    PolicyViolation,
    /// Invalid configuration or command line usage.
    ConfigurationError,
    /// Unexpected failure of the run itself.
    GlobalError,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::PolicyViolation => 1,
            ExitStatus::ConfigurationError => 2,
            ExitStatus::GlobalError => 70,
        }
    }

    pub fn for_scan(verdict: &ScanVerdict) -> Self {
        if verdict.global {
            ExitStatus::GlobalError
        } else if verdict.passed {
            ExitStatus::Success
        } else {
            ExitStatus::PolicyViolation
        }
    }

    pub fn for_fix(verdict: &FixVerdict) -> Self {
        if verdict.global {
            ExitStatus::GlobalError
        } else if verdict.is_error() {
            ExitStatus::PolicyViolation
        } else {
            ExitStatus::Success
        }
    }

    pub fn for_error(error: &EngineError) -> Self {
        if error.is_usage() {
            ExitStatus::ConfigurationError
        } else {
            ExitStatus::GlobalError
        }
    }
}
