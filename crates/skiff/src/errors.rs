//
// errors.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::fmt;

pub type Result<T> = std::result::Result<T, LinterError>;

/// The worker process hosting the engine died, or was made to look dead by
/// fault injection. The first operation that observes this marks the whole
/// [`crate::worker::WorkerHandle`] crashed; the flag is sticky.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessCrashed;

impl fmt::Display for ProcessCrashed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "linter worker process crashed")
    }
}

impl std::error::Error for ProcessCrashed {}

/// Errors surfaced by the public [`crate::linter::DocumentLinter`]
/// operations.
#[derive(Debug, PartialEq, Eq)]
pub enum LinterError {
    /// A worker crash interrupted the operation and no lint of the current
    /// text could be produced before the operation had to settle. The
    /// linter remains usable; the document keeps the diagnostics of the
    /// last successful lint.
    LintingCrashed,

    /// The linter was disposed while the operation was pending.
    Disposed,
}

impl fmt::Display for LinterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinterError::LintingCrashed => {
                write!(f, "linting crashed and could not recover in time")
            },
            LinterError::Disposed => {
                write!(f, "document linter was disposed")
            },
        }
    }
}

impl std::error::Error for LinterError {}
