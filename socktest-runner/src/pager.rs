// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pagination for the dashboard.
//!
//! The dashboard is meant to be read as it scrolls by, so when it is attached
//! to an interactive display the pager counts screen rows and pauses for a
//! keypress one row before the viewport fills, reserving the last row for its
//! own prompt. The prompt accepts a single key in raw mode: anything continues
//! one page, `q` turns pagination off for the rest of the run, and Ctrl-C
//! requests cancellation, which the category loop honors like any other
//! interrupt.
//!
//! Pagination silently disables itself up front if either stdin or stdout is
//! not a terminal, and disabling is one-way: the pager never re-enables
//! mid-run.

use crate::write_str::WriteStr;
#[cfg(test)]
use std::collections::VecDeque;
use std::io::{self, IsTerminal};
use tracing::warn;

const PROMPT: &str = "-- Enter for more, q for all, Ctrl-C to stop --";

/// The operator's answer to a pagination prompt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PageResponse {
    /// Continue for one more page.
    NextPage,

    /// Continue without pagination for the rest of the run.
    Unpaginated,

    /// Cancel the run.
    Cancel,
}

#[derive(Debug)]
enum PromptSource {
    /// Read a single keypress from the terminal in raw mode.
    Terminal,

    /// Scripted responses for tests; empty means `Unpaginated`.
    #[cfg(test)]
    Scripted(VecDeque<PageResponse>),
}

impl PromptSource {
    fn read(&mut self) -> PageResponse {
        match self {
            Self::Terminal => match read_key() {
                Ok(response) => response,
                Err(error) => {
                    // Can't read the keyboard; stop prompting rather than
                    // stalling the run.
                    warn!("failed to read pagination keypress: {error}");
                    PageResponse::Unpaginated
                }
            },
            #[cfg(test)]
            Self::Scripted(responses) => {
                responses.pop_front().unwrap_or(PageResponse::Unpaginated)
            }
        }
    }
}

#[derive(Debug)]
struct PagerState {
    /// Viewport height in rows.
    height: usize,

    /// Viewport width in columns; 0 if unknown (wrapping is then ignored).
    width: usize,

    /// Rows written since the last pause.
    rows_consumed: usize,

    prompt: PromptSource,
}

/// Tracks vertical screen position for the dashboard and pauses when the
/// viewport would overflow.
#[derive(Debug)]
pub struct Pager {
    /// `None` means pagination is off. Transitions to `None` are permanent.
    state: Option<PagerState>,
    cancel_requested: bool,
}

impl Pager {
    /// Probes the terminal and returns an enabled pager if both stdin and
    /// stdout are interactive and the viewport size is known.
    pub fn detect() -> Self {
        if !io::stdout().is_terminal() || !io::stdin().is_terminal() {
            return Self::disabled();
        }

        match crossterm::terminal::size() {
            Ok((cols, rows)) if rows >= 2 => Self {
                state: Some(PagerState {
                    height: usize::from(rows),
                    width: usize::from(cols),
                    rows_consumed: 0,
                    prompt: PromptSource::Terminal,
                }),
                cancel_requested: false,
            },
            Ok(_) => Self::disabled(),
            Err(error) => {
                warn!("failed to detect terminal size, pagination disabled: {error}");
                Self::disabled()
            }
        }
    }

    /// Returns a pager that never pauses.
    pub fn disabled() -> Self {
        Self {
            state: None,
            cancel_requested: false,
        }
    }

    /// Returns a pager that answers prompts from a fixed script.
    #[cfg(test)]
    pub(crate) fn scripted(
        height: usize,
        width: usize,
        responses: impl IntoIterator<Item = PageResponse>,
    ) -> Self {
        Self {
            state: Some(PagerState {
                height,
                width,
                rows_consumed: 0,
                prompt: PromptSource::Scripted(responses.into_iter().collect()),
            }),
            cancel_requested: false,
        }
    }

    /// Returns true if pagination is currently on.
    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }

    /// Returns true if the operator answered a prompt with Ctrl-C. Observed by
    /// the category loop between categories.
    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    /// Returns how many screen rows a line of `visible_chars` characters
    /// occupies, accounting for wrapping.
    pub(crate) fn wrap_rows(&self, visible_chars: usize) -> usize {
        let width = match &self.state {
            Some(state) if state.width > 0 => state.width,
            _ => return 1,
        };
        if visible_chars <= width {
            1
        } else {
            visible_chars.div_ceil(width)
        }
    }

    /// Advances the row counter by `rows` and prompts if the viewport is full.
    ///
    /// The prompt is written to `out` and cleared in place after the keypress.
    pub(crate) fn advance(&mut self, rows: usize, mut out: impl WriteStr) -> io::Result<()> {
        let Some(state) = &mut self.state else {
            return Ok(());
        };

        state.rows_consumed += rows;
        if state.rows_consumed < state.height.saturating_sub(1) {
            return Ok(());
        }

        out.write_str(PROMPT)?;
        out.write_str_flush()?;
        let response = state.prompt.read();

        // Clear the prompt; the cursor stays on the same row.
        write!(out, "\r{:width$}\r", "", width = PROMPT.len() + 3)?;
        out.write_str_flush()?;

        match response {
            PageResponse::NextPage => state.rows_consumed = 0,
            PageResponse::Unpaginated => self.state = None,
            PageResponse::Cancel => {
                self.state = None;
                self.cancel_requested = true;
            }
        }
        Ok(())
    }
}

/// Reads a single keypress in raw mode.
fn read_key() -> io::Result<PageResponse> {
    use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

    crossterm::terminal::enable_raw_mode()?;
    let result = loop {
        match event::read() {
            Ok(Event::Key(key)) => {
                if key.kind == KeyEventKind::Release {
                    continue;
                }
                break Ok(match key.code {
                    KeyCode::Char('q') | KeyCode::Char('Q') => PageResponse::Unpaginated,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        PageResponse::Cancel
                    }
                    KeyCode::Esc => PageResponse::Cancel,
                    // Enter or any other key: one more page.
                    _ => PageResponse::NextPage,
                });
            }
            Ok(_) => continue,
            Err(error) => break Err(error),
        }
    };
    crossterm::terminal::disable_raw_mode()?;
    result
}
