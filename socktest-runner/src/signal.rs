// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interrupt handling.
//!
//! The run is strictly sequential, so signal delivery is checked at defined
//! points (between categories) rather than interrupting test bodies. The
//! handler just forwards Ctrl-C (and SIGTERM, via ctrlc's termination
//! feature) onto a channel the category loop polls.

use crate::errors::SignalHandlerSetupError;
use crossbeam_channel::{Receiver, TryRecvError};

/// An event sent by the signal handler.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignalEvent {
    /// The operator requested an interrupt.
    Interrupted,
}

/// A signal handler checked between categories.
#[derive(Debug)]
pub struct SignalHandler {
    receiver: Option<Receiver<SignalEvent>>,
    interrupted: bool,
}

impl SignalHandler {
    /// Installs the process-wide Ctrl-C handler.
    ///
    /// This can only be called once per process.
    pub fn new() -> Result<Self, SignalHandlerSetupError> {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        ctrlc::set_handler(move || {
            let _ = sender.try_send(SignalEvent::Interrupted);
        })?;

        Ok(Self {
            receiver: Some(receiver),
            interrupted: false,
        })
    }

    /// Creates a handler that never fires. Useful for tests.
    pub fn noop() -> Self {
        Self {
            receiver: None,
            interrupted: false,
        }
    }

    /// Creates a handler fed from a caller-owned channel instead of the
    /// process-wide Ctrl-C handler.
    #[cfg(test)]
    pub(crate) fn with_receiver(receiver: Receiver<SignalEvent>) -> Self {
        Self {
            receiver: Some(receiver),
            interrupted: false,
        }
    }

    /// Returns true if an interrupt has been delivered.
    ///
    /// Once true, this keeps returning true: an interrupt cannot be undone.
    pub fn interrupted(&mut self) -> bool {
        if self.interrupted {
            return true;
        }

        if let Some(receiver) = &self.receiver {
            match receiver.try_recv() {
                Ok(SignalEvent::Interrupted) | Err(TryRecvError::Disconnected) => {
                    self.interrupted = true;
                }
                Err(TryRecvError::Empty) => {}
            }
        }

        self.interrupted
    }
}
