// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by socktest-runner.

use camino::Utf8PathBuf;
use thiserror::Error;

/// An error that occurred while writing a test event to one of the output
/// sinks.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing to the provided output.
    #[error("error writing to output")]
    Io(#[source] std::io::Error),

    /// An error occurred while operating on the file system.
    #[error("error operating on path {file}")]
    Fs {
        /// The file being operated on.
        file: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },
}

/// An error that occurred while setting up the Ctrl-C handler.
#[derive(Debug, Error)]
#[error("error setting up the interrupt handler")]
pub struct SignalHandlerSetupError(#[from] ctrlc::Error);
