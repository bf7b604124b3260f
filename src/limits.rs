//! Configurable resource limits for directory reading and writing.
//!
//! A malicious or corrupted file can claim an entry count or tag byte length far larger than any
//! real image would need; these limits bound how much the reader is willing to allocate on the
//! strength of an unverified count field before it has read the bytes backing it.

/// Limits applied while reading a directory chain.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct DecodeLimits {
    /// Maximum size, in bytes, of any single tag's value payload.
    pub max_tag_value_bytes: usize,
    /// Maximum number of entries a single directory may declare.
    pub max_directory_entries: usize,
    /// Target byte size used by the strip-chop heuristic when it splits an oversized strip.
    pub strip_chop_target_bytes: usize,
    /// Whether the strip-chop heuristic runs at all during the repair phase.
    pub strip_chop: bool,
}

impl DecodeLimits {
    /// A configuration that does not impose any limits.
    ///
    /// Useful as a starting point for callers who only want to disable one specific limit, since
    /// the default limits intentionally leave no field obviously disableable in isolation.
    pub fn unlimited() -> Self {
        DecodeLimits {
            max_tag_value_bytes: usize::MAX,
            max_directory_entries: usize::MAX,
            strip_chop_target_bytes: usize::MAX,
            strip_chop: false,
        }
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        DecodeLimits {
            max_tag_value_bytes: 4 * 1024 * 1024,
            max_directory_entries: 4096,
            strip_chop_target_bytes: 8192,
            strip_chop: true,
        }
    }
}

/// Limits applied while writing a directory.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct EncodeLimits {
    /// Maximum size, in bytes, of any single tag's value payload.
    pub max_tag_value_bytes: usize,
    /// Maximum number of entries a single directory may hold.
    pub max_directory_entries: usize,
}

impl EncodeLimits {
    pub fn unlimited() -> Self {
        EncodeLimits {
            max_tag_value_bytes: usize::MAX,
            max_directory_entries: usize::MAX,
        }
    }
}

impl Default for EncodeLimits {
    fn default() -> Self {
        EncodeLimits {
            max_tag_value_bytes: 4 * 1024 * 1024,
            max_directory_entries: 4096,
        }
    }
}
