//! Warn-once flag for unsupported host runtime versions.
//!
//! The flag is owned by whoever embeds the runtime (usually shared by all clients of
//! an application through an `Arc`), not by a module-level static, so tests and
//! long-running hosts can re-arm it with [`VersionWarning::reset`].

use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;

#[derive(Debug)]
pub struct VersionWarning {
    minimum_major: u64,
    warned: AtomicBool,
}

impl VersionWarning {
    pub const fn new(minimum_major: u64) -> Self {
        Self {
            minimum_major,
            warned: AtomicBool::new(false),
        }
    }

    /// Warn if `version` (`"v14.2.0"`, `"1.70"`) is below the supported major
    /// version. Returns `true` only for the call that actually emitted.
    ///
    /// Versions that cannot be parsed are ignored.
    pub fn emit_if_unsupported(&self, version: &str) -> bool {
        let Some(major) = parse_major(version) else {
            return false;
        };
        if major >= self.minimum_major {
            return false;
        }
        if self.warned.swap(true, Ordering::SeqCst) {
            return false;
        }
        warn!(
            "Runtime version {version} is below the minimum supported major version {}. \
             Please upgrade to continue receiving updates.",
            self.minimum_major
        );
        true
    }

    pub fn has_warned(&self) -> bool {
        self.warned.load(Ordering::SeqCst)
    }

    /// Re-arm the flag so the next unsupported version warns again.
    pub fn reset(&self) {
        self.warned.store(false, Ordering::SeqCst);
    }
}

fn parse_major(version: &str) -> Option<u64> {
    version
        .trim()
        .trim_start_matches(['v', 'V'])
        .split('.')
        .next()
        .and_then(|major| major.parse().ok())
}
