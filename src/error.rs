//! Error types for `vamana-diskann`.
//!
//! One unified error type for codec, index-file, search and insertion
//! failures, designed to be returned across the cursor boundary to the
//! host database unchanged.

use thiserror::Error;

/// Result type alias for `vamana-diskann` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Truncates a fragment to a safe length for embedding in an error message.
///
/// Truncates on a char boundary so multibyte UTF-8 text near the cutoff
/// does not panic.
fn truncate_fragment(s: &str) -> String {
    const MAX: usize = 64;
    if s.len() <= MAX {
        s.to_string()
    } else {
        let cut = s.char_indices().nth(MAX).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..cut])
    }
}

/// Errors that can occur in `vamana-diskann` operations.
///
/// Variants follow spec §7 exactly; each carries the context the spec
/// requires ("echo the offending fragment", "state both observed
/// dimensions").
#[derive(Error, Debug)]
pub enum Error {
    /// Allocation failed.
    #[error("out of memory")]
    NoMemory,

    /// Malformed textual vector literal.
    #[error("invalid vector text near '{fragment}': {reason}")]
    InvalidText {
        /// Offending fragment, truncated to a safe length.
        fragment: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Malformed vector blob.
    #[error("invalid vector blob: {0}")]
    InvalidBlob(String),

    /// Vector dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the first operand.
        expected: usize,
        /// Dimension of the second operand.
        actual: usize,
    },

    /// The on-disk format failed validation (bad magic, out-of-range
    /// offset, neighbor count exceeding `R_max`, ...). Fatal for the
    /// current cursor: subsequent operations also return `Corrupt`.
    #[error("index corrupted: {0}")]
    Corrupt(String),

    /// The host VFS returned a non-OK status.
    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),

    /// Backlink write to a neighbor failed during insert. Non-fatal: the
    /// new point is present and reachable from itself; `insert` still
    /// returns success, but this is reported to the caller.
    #[error("partial backlink: neighbor at offset {offset} could not be updated: {source}")]
    PartialBacklink {
        /// Block offset of the neighbor that could not be updated.
        offset: u64,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Builds an [`Error::InvalidText`] with the fragment safely truncated.
    #[must_use]
    pub fn invalid_text(fragment: &str, reason: impl Into<String>) -> Self {
        Self::InvalidText {
            fragment: truncate_fragment(fragment),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_states_both_dimensions() {
        let err = Error::DimensionMismatch {
            expected: 3,
            actual: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains('5'));
    }

    #[test]
    fn invalid_text_truncates_long_fragment() {
        let long = "x".repeat(200);
        let err = Error::invalid_text(&long, "too many components");
        let msg = err.to_string();
        assert!(msg.len() < long.len());
        assert!(msg.contains("too many components"));
    }

    #[test]
    fn invalid_text_truncates_multibyte_fragment_without_panicking() {
        let long = "é".repeat(40);
        let err = Error::invalid_text(&long, "too many components");
        let msg = err.to_string();
        assert!(msg.contains("too many components"));
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::other("disk full");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IOError(_)));
    }

    #[test]
    fn partial_backlink_is_not_corrupt() {
        let err = Error::PartialBacklink {
            offset: 4096,
            source: std::io::Error::other("write failed"),
        };
        assert!(!matches!(err, Error::Corrupt(_)));
    }
}
