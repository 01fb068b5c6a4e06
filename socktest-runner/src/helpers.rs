// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod plural {
    /// Returns "issue" if `count` is 1, otherwise "issues".
    pub fn issues_str(count: usize) -> &'static str {
        if count == 1 { "issue" } else { "issues" }
    }
}
