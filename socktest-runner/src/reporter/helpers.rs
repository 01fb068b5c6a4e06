// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use owo_colors::Style;

#[derive(Debug, Default, Clone)]
pub(super) struct Styles {
    pub(super) count: Style,
    pub(super) pass: Style,
    pub(super) fail: Style,
    pub(super) known: Style,
    pub(super) skip: Style,
    pub(super) header: Style,
}

impl Styles {
    pub(super) fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.known = Style::new().yellow();
        self.skip = Style::new().yellow().bold();
        self.header = Style::new().bold();
    }
}
