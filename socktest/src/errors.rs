// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use socktest_runner::{
    errors::{SignalHandlerSetupError, WriteEventError},
    reporter::RunStatus,
};
use std::error::Error;
use thiserror::Error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Exit codes produced by socktest.
///
/// The three run outcomes map to three distinct, ordered codes; setup
/// failures share the aborted code since the run never completed.
pub struct SocktestExitCode;

impl SocktestExitCode {
    /// The run completed with no unexpected failures.
    pub const CLEAN: i32 = 0;

    /// The run completed, but at least one unexpected failure was recorded.
    pub const UNEXPECTED_FAILURES: i32 = 100;

    /// The run was aborted, or never got off the ground.
    pub const ABORTED: i32 = 102;
}

/// Converts a finished run's status into the process exit code.
pub(crate) fn status_exit_code(status: RunStatus) -> i32 {
    match status {
        RunStatus::Clean => SocktestExitCode::CLEAN,
        RunStatus::UnexpectedFailures => SocktestExitCode::UNEXPECTED_FAILURES,
        RunStatus::Aborted => SocktestExitCode::ABORTED,
    }
}

/// An error expected to occur during normal operation, reported without a
/// backtrace.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("error setting up the interrupt handler")]
    SignalHandlerSetup {
        #[from]
        err: SignalHandlerSetupError,
    },
    #[error("error writing test output")]
    WriteEvent {
        #[from]
        err: WriteEventError,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::SignalHandlerSetup { .. } | Self::WriteEvent { .. } => {
                SocktestExitCode::ABORTED
            }
        }
    }

    /// Displays this error to stderr, including its source chain.
    pub fn display_to_stderr(&self) {
        tracing::error!("{self}");
        let mut next = self.source();
        while let Some(err) = next {
            tracing::error!(target: "socktest::no_heading", "  caused by: {err}");
            next = err.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_and_ordered() {
        let codes = [
            status_exit_code(RunStatus::Clean),
            status_exit_code(RunStatus::UnexpectedFailures),
            status_exit_code(RunStatus::Aborted),
        ];
        assert!(codes.windows(2).all(|pair| pair[0] < pair[1]), "{codes:?}");
    }
}
