//! Directory access gate with a per-run skip set
use log::{debug, error, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

/// Number of entries listed by the access check before it is satisfied.
pub const SAMPLE_ENTRY_LIMIT: usize = 10;

/// Guidance category for a directory that could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessGuidance {
    /// A synced cloud drive folder guarded by the OS privacy layer.
    CloudStorage,
    /// A protected user folder (Library, Desktop, Documents).
    ProtectedFolder,
    Generic,
}

impl AccessGuidance {
    pub fn for_dir(dir: &Path) -> Self {
        let s = dir.to_string_lossy();
        if s.contains("Library/Mobile Documents/com~apple~CloudDocs") {
            AccessGuidance::CloudStorage
        } else if s.contains("Library") || s.contains("Desktop") || s.contains("Documents") {
            AccessGuidance::ProtectedFolder
        } else {
            AccessGuidance::Generic
        }
    }

    pub fn message(self, dir: &Path) -> String {
        match self {
            AccessGuidance::CloudStorage => format!(
                "Access to cloud storage denied: {}. Grant the terminal access to the cloud drive under Privacy > Files and Folders, then restart it.",
                dir.display()
            ),
            AccessGuidance::ProtectedFolder => format!(
                "Access to protected folder denied: {}. Add the terminal to Privacy > Full Disk Access, then restart it.",
                dir.display()
            ),
            AccessGuidance::Generic => format!(
                "No read permission for: {}. Check the directory permissions or run with elevated rights.",
                dir.display()
            ),
        }
    }
}

/// Decides whether a directory may be traversed and remembers the ones that may not.
///
/// Every path in the skip set also covers all of its descendants. The set only
/// grows during a run and is dropped with the gate.
#[derive(Debug)]
pub struct RetryGate {
    timeout: Duration,
    skip_set: HashSet<PathBuf>,
    advised: HashSet<PathBuf>,
}

impl RetryGate {
    pub fn new(timeout_seconds: u64) -> Self {
        Self::with_listing_timeout(Duration::from_secs(timeout_seconds))
    }

    /// A zero timeout disables the sample listing.
    pub fn with_listing_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            skip_set: HashSet::new(),
            advised: HashSet::new(),
        }
    }

    pub fn should_skip(&self, dir: &Path) -> bool {
        let normalized = normalize_path(dir);
        let skip = self.skip_set.iter().any(|s| normalized.starts_with(s));
        if skip {
            debug!("Skipping directory after earlier failure: {}", dir.display());
        }
        skip
    }

    pub fn add_skip(&mut self, dir: &Path) {
        self.skip_set.insert(normalize_path(dir));
    }

    pub fn skipped(&self) -> impl Iterator<Item = &Path> {
        self.skip_set.iter().map(PathBuf::as_path)
    }

    /// Approximate check: a successful sample listing only shows that the first few
    /// entries could be listed within the timeout.
    pub fn grant_access(&mut self, dir: &Path) -> bool {
        if self.should_skip(dir) {
            return false;
        }

        if !is_readable_dir(dir) {
            self.advise(dir);
            self.add_skip(dir);
            return false;
        }

        if self.timeout.is_zero() {
            return true;
        }

        match self.sample_listing(dir) {
            Ok(true) => true,
            Ok(false) => {
                warn!(
                    "Timed out listing {}; skipping it for this search",
                    dir.display()
                );
                self.add_skip(dir);
                false
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                warn!("No permission for {}", dir.display());
                self.advise(dir);
                self.add_skip(dir);
                false
            }
            Err(e) => {
                error!("Error accessing {}: {e}", dir.display());
                self.add_skip(dir);
                false
            }
        }
    }

    fn sample_listing(&self, dir: &Path) -> std::io::Result<bool> {
        let start = Instant::now();
        for (i, entry) in fs::read_dir(dir)?.enumerate() {
            entry?;
            if i >= SAMPLE_ENTRY_LIMIT {
                break;
            }
            if start.elapsed() > self.timeout {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn advise(&mut self, dir: &Path) {
        let normalized = normalize_path(dir);
        if self.advised.iter().any(|a| normalized.starts_with(a)) {
            return;
        }
        warn!("{}", AccessGuidance::for_dir(dir).message(dir));
        self.advised.insert(normalized);
    }
}

#[cfg(unix)]
fn is_readable_dir(dir: &Path) -> bool {
    use nix::unistd::{AccessFlags, access};
    access(dir, AccessFlags::R_OK | AccessFlags::X_OK).is_ok()
}

#[cfg(not(unix))]
fn is_readable_dir(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok()
}

/// Lexical normalisation: drops `.` components and folds `..` into the parent.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn normalizes_lexically() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("./")), PathBuf::from("."));
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn skip_set_covers_descendants_only() {
        let mut gate = RetryGate::new(0);
        gate.add_skip(Path::new("/srv/data"));
        assert!(gate.should_skip(Path::new("/srv/data")));
        assert!(gate.should_skip(Path::new("/srv/data/nested/deeper")));
        assert!(!gate.should_skip(Path::new("/srv/database")));
        assert!(!gate.should_skip(Path::new("/srv")));
    }

    #[test]
    fn readable_dir_is_granted_without_mutation() {
        let dir = tempdir().unwrap();
        for i in 0..15 {
            std::fs::write(dir.path().join(format!("f{i}.txt")), "x").unwrap();
        }
        let mut gate = RetryGate::new(5);
        assert!(gate.grant_access(dir.path()));
        assert_eq!(gate.skipped().count(), 0);
    }

    #[test]
    fn missing_dir_is_denied_and_remembered() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone");
        let mut gate = RetryGate::new(5);
        assert!(!gate.grant_access(&missing));
        assert!(gate.should_skip(&missing.join("child")));
    }

    #[test]
    fn slow_listing_is_denied_and_remembered() {
        let dir = tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("f{i}.txt")), "x").unwrap();
        }
        let mut gate = RetryGate::with_listing_timeout(Duration::from_nanos(1));
        assert!(!gate.grant_access(dir.path()));
        assert!(gate.should_skip(&dir.path().join("nested")));
        assert_eq!(gate.skipped().count(), 1);
    }

    #[test]
    fn skipped_dir_is_denied_immediately() {
        let dir = tempdir().unwrap();
        let mut gate = RetryGate::new(0);
        gate.add_skip(dir.path());
        assert!(!gate.grant_access(dir.path()));
    }

    #[test]
    fn guidance_categories() {
        assert_eq!(
            AccessGuidance::for_dir(Path::new(
                "/Users/x/Library/Mobile Documents/com~apple~CloudDocs/a"
            )),
            AccessGuidance::CloudStorage
        );
        assert_eq!(
            AccessGuidance::for_dir(Path::new("/Users/x/Desktop")),
            AccessGuidance::ProtectedFolder
        );
        assert_eq!(
            AccessGuidance::for_dir(Path::new("/var/lib/secret")),
            AccessGuidance::Generic
        );
    }
}
