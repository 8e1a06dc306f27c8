//! Searching inside ZIP, TAR+GZIP and GZIP archives.
//!
//! Archives are unpacked one at a time into a private scratch directory and
//! the extracted tree is searched with the regular [`DirectoryWalker`].
//!
//! [`DirectoryWalker`]: crate::walker::DirectoryWalker
mod extract;
mod search;

pub use extract::{ArchiveExtractor, ArchiveKind, EXPANSION_FACTOR, MAX_ENTRIES, is_archive};
pub use search::{ARCHIVE_TIMEOUT_MULTIPLIER, ArchiveSearcher, default_scratch_root};
