// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Version detection for socket backends.
//!
//! Backends identify themselves with a free-form release string (e.g. `"UAE
//! 8.0.0"` or `"Roadshow 4.364"`). After the catalog matches a profile prefix,
//! the remainder of the string is parsed into a [`DetectedVersion`] which is
//! compared against per-entry version ceilings.

use std::fmt;

/// A version number extracted from a backend identification string.
///
/// Ordering is component-wise: major, then minor, then patch. A string with no
/// digits parses to [`DetectedVersion::ZERO`] -- many backends report no
/// version at all, and that is not an error.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct DetectedVersion {
    /// The major version.
    pub major: u32,
    /// The minor version.
    pub minor: u32,
    /// The patch version.
    pub patch: u32,
}

impl DetectedVersion {
    /// The all-zero version, returned when no digits are found.
    pub const ZERO: Self = Self {
        major: 0,
        minor: 0,
        patch: 0,
    };

    /// Creates a new version from components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses a version out of a free-form string.
    ///
    /// Leading whitespace is skipped, then up to three decimal digit runs
    /// separated by `.` are read into major/minor/patch. A trailing digit run
    /// without a following separator is still captured, and anything after the
    /// third component is ignored. This never fails: a string without leading
    /// digits produces [`DetectedVersion::ZERO`].
    pub fn parse(input: &str) -> Self {
        let mut rest = input.trim_start().as_bytes();
        let mut components = [0_u32; 3];

        for component in &mut components {
            let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
            if digits == 0 {
                break;
            }
            *component = rest[..digits]
                .iter()
                .fold(0_u32, |acc, b| acc.saturating_mul(10).saturating_add(u32::from(b - b'0')));
            rest = &rest[digits..];

            match rest.first() {
                Some(b'.') => rest = &rest[1..],
                _ => break,
            }
        }

        let [major, minor, patch] = components;
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for DetectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("8.0.0", DetectedVersion::new(8, 0, 0); "full triple")]
    #[test_case(" 8.0.0", DetectedVersion::new(8, 0, 0); "leading space")]
    #[test_case("4.364", DetectedVersion::new(4, 364, 0); "two components")]
    #[test_case("8", DetectedVersion::new(8, 0, 0); "bare major")]
    #[test_case("7.1.1rc2", DetectedVersion::new(7, 1, 1); "trailing junk")]
    #[test_case("1.2.3.4", DetectedVersion::new(1, 2, 3); "fourth component ignored")]
    #[test_case("6.0.", DetectedVersion::new(6, 0, 0); "trailing dot")]
    #[test_case("", DetectedVersion::ZERO; "empty")]
    #[test_case("   ", DetectedVersion::ZERO; "whitespace only")]
    #[test_case("beta", DetectedVersion::ZERO; "no digits")]
    #[test_case("v8.0", DetectedVersion::ZERO; "non-digit prefix")]
    fn parse(input: &str, expected: DetectedVersion) {
        assert_eq!(DetectedVersion::parse(input), expected, "parsing {input:?}");
    }

    #[test]
    fn parse_saturates_on_overflow() {
        let version = DetectedVersion::parse("99999999999.1.2");
        assert_eq!(version.major, u32::MAX);
        assert_eq!((version.minor, version.patch), (1, 2));
    }

    #[test]
    fn ordering_is_component_wise() {
        let ceiling = DetectedVersion::new(8, 0, 0);
        assert!(DetectedVersion::new(8, 0, 0) <= ceiling);
        assert!(DetectedVersion::new(7, 99, 99) <= ceiling);
        assert!(DetectedVersion::new(8, 0, 1) > ceiling);
        assert!(DetectedVersion::new(8, 1, 0) > ceiling);
        assert!(DetectedVersion::new(9, 0, 0) > ceiling);
    }

    #[test]
    fn display_round_trips() {
        let version = DetectedVersion::new(4, 364, 0);
        assert_eq!(DetectedVersion::parse(&version.to_string()), version);
    }
}
