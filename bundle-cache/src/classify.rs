//! Maps raw fetch errors onto [`BundleError`].
//!
//! Fetch implementations report failures as free-form text (often the text of
//! an external tool), so classification is a best-effort match over the error
//! and its source chain. The rules live in an ordered table; the first match
//! wins and anything unmatched is a download failure.

use std::error::Error as StdError;
use std::io;

use crate::BundleError;

/// Default rules, checked in order. Matching is case-sensitive.
pub const DEFAULT_PATTERNS: &[(&str, BundleError)] = &[
    ("no space left on device", BundleError::Extract),
    // How `std::io::Error` renders ENOSPC.
    ("No space left on device", BundleError::Extract),
];

/// Ordered substring classifier for fetch errors.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    patterns: &'static [(&'static str, BundleError)],
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS,
        }
    }
}

impl Classifier {
    /// Creates a classifier with a custom rule table.
    pub fn with_patterns(patterns: &'static [(&'static str, BundleError)]) -> Self {
        Self { patterns }
    }

    /// Classifies a raw fetch error.
    ///
    /// An `io::Error` of kind `StorageFull` anywhere in the chain is an
    /// extraction failure regardless of its text.
    pub fn classify(&self, err: &(dyn StdError + 'static)) -> BundleError {
        let chain = || std::iter::successors(Some(err), |&e| e.source());

        if chain().any(is_storage_full) {
            return BundleError::Extract;
        }

        let messages: Vec<String> = chain().map(ToString::to_string).collect();
        self.patterns
            .iter()
            .find(|(pattern, _)| messages.iter().any(|m| m.contains(pattern)))
            .map_or(BundleError::Download, |(_, kind)| *kind)
    }
}

fn is_storage_full(err: &(dyn StdError + 'static)) -> bool {
    err.downcast_ref::<io::Error>()
        .is_some_and(|e| e.kind() == io::ErrorKind::StorageFull)
}
