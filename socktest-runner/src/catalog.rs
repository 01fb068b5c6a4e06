// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Known-issue catalog for socket backends.
//!
//! Each backend implementation ships with its own defect profile: tests that
//! are expected to fail against it, and operations that must not even be
//! attempted because they terminate the backend process. The catalog maps a
//! backend identification string to a [`BackendProfile`] and answers
//! classification queries by test id.
//!
//! Entries are version-gated: an entry with a version ceiling stops matching
//! as soon as the backend reports a newer version, so a backend that ships a
//! fix silently stops being annotated with no catalog change.

use crate::version::DetectedVersion;
use std::borrow::Cow;

/// The classification of a known issue.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IssueKind {
    /// The test runs and fails; the failure is annotated as known rather than
    /// unexpected.
    Failure,

    /// The operation crashes or hangs the backend. Test bodies must consult
    /// [`ActiveProfile::crash`] first and skip the operation on a match.
    Crash,
}

/// A single cataloged defect for one backend profile.
#[derive(Clone, Debug)]
pub struct KnownIssueEntry {
    /// The sequential test id the entry applies to.
    pub test_id: u32,

    /// Whether this is a known failure or a known crash.
    pub kind: IssueKind,

    /// A short human explanation, copied into log annotations.
    pub reason: Cow<'static, str>,

    /// The most recent backend version the entry applies to, inclusive. `None`
    /// means the entry applies to every version.
    pub max_version: Option<DetectedVersion>,
}

impl KnownIssueEntry {
    /// Creates a known-failure entry with no version ceiling.
    pub fn failure(test_id: u32, reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            test_id,
            kind: IssueKind::Failure,
            reason: reason.into(),
            max_version: None,
        }
    }

    /// Creates a known-crash entry with no version ceiling.
    pub fn crash(test_id: u32, reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            test_id,
            kind: IssueKind::Crash,
            reason: reason.into(),
            max_version: None,
        }
    }

    /// Sets the version ceiling, inclusive.
    #[must_use]
    pub fn with_max_version(mut self, max_version: DetectedVersion) -> Self {
        self.max_version = Some(max_version);
        self
    }

    fn applies_to(&self, version: DetectedVersion) -> bool {
        match self.max_version {
            Some(ceiling) => version <= ceiling,
            None => true,
        }
    }
}

/// The defect profile for one backend implementation.
#[derive(Clone, Debug)]
pub struct BackendProfile {
    /// Prefix matched against the identification string.
    pub match_prefix: Cow<'static, str>,

    /// Display name used in log annotations.
    pub display_name: Cow<'static, str>,

    /// Known issues, in table order. If two entries share a test id, the first
    /// one wins; that is a catalog-authoring responsibility, checked by the
    /// catalog's own tests rather than at runtime.
    pub entries: Vec<KnownIssueEntry>,
}

impl BackendProfile {
    /// Creates a new profile.
    pub fn new(
        match_prefix: impl Into<Cow<'static, str>>,
        display_name: impl Into<Cow<'static, str>>,
        entries: Vec<KnownIssueEntry>,
    ) -> Self {
        Self {
            match_prefix: match_prefix.into(),
            display_name: display_name.into(),
            entries,
        }
    }
}

/// An ordered table of backend profiles.
#[derive(Clone, Debug, Default)]
pub struct KnownIssueCatalog {
    profiles: Vec<BackendProfile>,
}

impl KnownIssueCatalog {
    /// Creates a catalog from an ordered list of profiles.
    pub fn new(profiles: Vec<BackendProfile>) -> Self {
        Self { profiles }
    }

    /// The catalog shipped with socktest, covering the backends it has been
    /// run against.
    pub fn builtin() -> Self {
        Self::new(builtin_profiles())
    }

    /// Selects the profile for a backend identification string.
    ///
    /// Each profile's `match_prefix` is tried as a prefix of the
    /// identification string, in table order; the first match wins regardless
    /// of prefix length. The remainder of the string after the prefix is
    /// parsed into the detected version. If the identification string is
    /// absent or nothing matches, the returned profile is inactive and every
    /// classification query answers `None`.
    pub fn select(&self, ident: Option<&str>) -> ActiveProfile<'_> {
        let Some(ident) = ident else {
            return ActiveProfile { selected: None };
        };

        let selected = self.profiles.iter().find_map(|profile| {
            let rest = ident.strip_prefix(profile.match_prefix.as_ref())?;
            Some((profile, DetectedVersion::parse(rest)))
        });

        ActiveProfile { selected }
    }

    /// The profiles in this catalog, in table order.
    pub fn profiles(&self) -> &[BackendProfile] {
        &self.profiles
    }
}

/// The profile selected for the current run, resolved against the detected
/// backend version.
///
/// Selected once at startup and read-only thereafter. All queries are
/// side-effect-free, so test bodies may consult [`crash`](Self::crash) as many
/// times as they like before deciding whether to run a guarded operation.
#[derive(Clone, Copy, Debug)]
pub struct ActiveProfile<'cat> {
    selected: Option<(&'cat BackendProfile, DetectedVersion)>,
}

impl<'cat> ActiveProfile<'cat> {
    /// An inactive profile: every query answers `None`.
    pub fn inactive() -> Self {
        Self { selected: None }
    }

    /// Returns true if a profile was selected.
    pub fn is_active(&self) -> bool {
        self.selected.is_some()
    }

    /// The display name of the selected backend, if any.
    pub fn backend_name(&self) -> Option<&'cat str> {
        self.selected.map(|(profile, _)| profile.display_name.as_ref())
    }

    /// The version detected from the identification string, if a profile was
    /// selected.
    pub fn version(&self) -> Option<DetectedVersion> {
        self.selected.map(|(_, version)| version)
    }

    /// Looks up a known issue of any kind for `test_id`.
    ///
    /// Returns the first version-eligible entry in table order.
    pub fn check(&self, test_id: u32) -> Option<&'cat KnownIssueEntry> {
        self.lookup(test_id, None)
    }

    /// Returns the reason `test_id` must not be exercised against this
    /// backend, or `None` if it is safe to run.
    ///
    /// Test bodies call this before crash-prone operations; on a match the
    /// operation is skipped entirely, not attempted.
    pub fn crash(&self, test_id: u32) -> Option<&'cat str> {
        self.lookup(test_id, Some(IssueKind::Crash))
            .map(|entry| entry.reason.as_ref())
    }

    fn lookup(&self, test_id: u32, kind: Option<IssueKind>) -> Option<&'cat KnownIssueEntry> {
        let (profile, version) = self.selected?;
        profile.entries.iter().find(|entry| {
            entry.test_id == test_id
                && kind.map_or(true, |kind| entry.kind == kind)
                && entry.applies_to(version)
        })
    }
}

/// Shorthand for building the builtin tables.
fn failure(
    test_id: u32,
    reason: &'static str,
    ceiling: DetectedVersion,
) -> KnownIssueEntry {
    KnownIssueEntry::failure(test_id, reason).with_max_version(ceiling)
}

fn crash(test_id: u32, reason: &'static str, ceiling: DetectedVersion) -> KnownIssueEntry {
    KnownIssueEntry::crash(test_id, reason).with_max_version(ceiling)
}

fn builtin_profiles() -> Vec<BackendProfile> {
    // Versions the entries were last verified against. Newer releases fall
    // outside the ceilings and run unannotated until re-verified.
    const ROADSHOW: DetectedVersion = DetectedVersion::new(4, 364, 0);
    const UAE_6: DetectedVersion = DetectedVersion::new(6, 0, 2);
    const UAE_7: DetectedVersion = DetectedVersion::new(7, 1, 1);

    let roadshow = BackendProfile::new(
        "Roadshow",
        "Roadshow",
        vec![
            failure(27, "recv(MSG_OOB) returns EINVAL", ROADSHOW),
            failure(35, "loopback does not generate RST for closed peer", ROADSHOW),
            failure(76, "errno long-pointer GET not supported (SET-only)", ROADSHOW),
            failure(77, "h_errno long-pointer GET not supported (SET-only)", ROADSHOW),
        ],
    );

    // WinUAE (6.x) and Amiberry (7.x) both identify as "UAE"; entries are
    // told apart by their version ceilings. The 8.0.0 release fixed all of
    // these, so an up-to-date emulator matches nothing here.
    let uae = BackendProfile::new(
        "UAE",
        "UAE bsdsocket emulation",
        vec![
            // Event-mask and event-queue operations are fatal on both lines:
            // out-of-bounds accesses on 7.x, lost signal delivery that hangs
            // the caller forever on 6.x.
            crash(70, "WaitSelect with >64 fds causes out-of-bounds access", UAE_7),
            crash(79, "SO_EVENTMASK FD_READ crashes or hangs the emulator", UAE_7),
            crash(80, "SO_EVENTMASK FD_CONNECT crashes or hangs the emulator", UAE_7),
            crash(81, "SO_EVENTMASK spurious-event test crashes or hangs the emulator", UAE_7),
            crash(82, "SO_EVENTMASK FD_ACCEPT crashes or hangs the emulator", UAE_7),
            crash(83, "SO_EVENTMASK FD_CLOSE crashes or hangs the emulator", UAE_7),
            crash(84, "GetSocketEvents consumed-event test crashes or hangs the emulator", UAE_7),
            crash(85, "GetSocketEvents round-robin test crashes or hangs the emulator", UAE_7),
            crash(87, "WaitSelect + signals stress test crashes or hangs the emulator", UAE_7),
            // Failures observed on both lines.
            failure(35, "send after peer close returns wrong errno", UAE_7),
            failure(52, "SO_ERROR not set after failed connect", UAE_7),
            failure(63, "WaitSelect with NULL fdsets returns immediately", UAE_7),
            failure(78, "descriptor-table-size GET returns 0", UAE_7),
            failure(98, "gethostname() returns empty string", UAE_7),
            failure(111, "Inet_LnaOf() stub returns 0", UAE_7),
            failure(112, "Inet_NetOf() stub returns 0", UAE_7),
            failure(113, "Inet_MakeAddr() returns 0 (LnaOf/NetOf broken)", UAE_7),
            failure(116, "Dup2Socket() to a specific slot not implemented", UAE_7),
            failure(128, "descriptor-table-size GET returns 0, can't test SET", UAE_7),
            // 7.x-only failures.
            failure(31, "sendmsg() data corruption (sends from address 0)", UAE_7),
            failure(32, "recvmsg() off-by-one in MSG_TRUNC detection", UAE_7),
            failure(49, "SO_RCVTIMEO getsockopt fails (optlen mismatch)", UAE_7),
            failure(50, "SO_SNDTIMEO getsockopt fails (optlen mismatch)", UAE_7),
            failure(93, "getservbyname() returns stale pointer", UAE_7),
            failure(94, "getservbyport() byte order bug", UAE_7),
            failure(12, "connect() stale errno causes ECONNREFUSED", UAE_7),
            failure(15, "accept() stale errno causes EWOULDBLOCK", UAE_7),
            failure(33, "recv() stale errno causes EWOULDBLOCK", UAE_7),
            failure(55, "IoctlSocket(FIONBIO) errno not set (stale errno)", UAE_7),
            failure(125, "stale errno not replaced by ECONNREFUSED", UAE_7),
            failure(126, "stale errno causes connect() EBADF", UAE_7),
            // 6.x-only failures.
            failure(48, "SO_LINGER set/get roundtrip fails", UAE_6),
            failure(69, "WaitSelect nfds limit not enforced", UAE_6),
        ],
    );

    vec![roadshow, uae]
}
