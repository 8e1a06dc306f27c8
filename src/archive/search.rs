use super::extract::{ArchiveExtractor, is_archive};
use crate::context::SearchContext;
use crate::gate::RetryGate;
use crate::options::SearchPattern;
use crate::processor::FileSearcher;
use crate::progress::ProgressTracker;
use crate::results::{MatchRecord, SearchStats};
use crate::walker::{DirectoryWalker, is_hidden};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

/// Archive discovery may run this many times the configured timeout.
pub const ARCHIVE_TIMEOUT_MULTIPLIER: u32 = 3;

/// Scratch directory that is emptied on creation and removed on drop.
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create(path: &Path) -> std::io::Result<Self> {
        if path.exists() {
            debug!("Clearing stale scratch directory {}", path.display());
            fs::remove_dir_all(path)?;
        }
        fs::create_dir_all(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!(
                "Failed to clean up scratch directory {}: {e}",
                self.path.display()
            );
        }
    }
}

pub fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join(format!("fileder-scratch-{}", std::process::id()))
}

/// Finds archives below a directory and searches their extracted contents.
pub struct ArchiveSearcher {
    ctx: SearchContext,
    scratch_root: PathBuf,
}

impl ArchiveSearcher {
    pub fn new(ctx: SearchContext) -> Self {
        Self {
            ctx,
            scratch_root: default_scratch_root(),
        }
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = root.into();
        self
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Matches found inside archives carry `"<archive>::<path inside archive>"`
    /// as their file path.
    pub fn search_archives(
        &self,
        dir: &Path,
        pattern: &SearchPattern,
    ) -> (Vec<MatchRecord>, SearchStats) {
        let deadline = self
            .ctx
            .deadline(Instant::now(), ARCHIVE_TIMEOUT_MULTIPLIER);
        self.search_archives_until(dir, pattern, deadline)
    }

    /// Discovery stops at `deadline`; archives already found are still searched.
    pub fn search_archives_until(
        &self,
        dir: &Path,
        pattern: &SearchPattern,
        deadline: Option<Instant>,
    ) -> (Vec<MatchRecord>, SearchStats) {
        let tracker = self.ctx.new_tracker();
        if !dir.is_dir() {
            error!("Not a directory: {}", dir.display());
            tracker.add_errors(1);
            return (Vec::new(), tracker.finish());
        }

        let scratch = match ScratchDir::create(&self.scratch_root) {
            Ok(s) => s,
            Err(e) => {
                error!(
                    "Cannot prepare scratch directory {}: {e}",
                    self.scratch_root.display()
                );
                tracker.add_errors(1);
                return (Vec::new(), tracker.finish());
            }
        };

        let mut stats = SearchStats::default();
        let archives = self.discover(dir, deadline, &tracker, &mut stats);
        info!("Found {} archive(s) under {}", archives.len(), dir.display());

        let extractor = ArchiveExtractor::new(&self.ctx.options);
        // Excluded paths were checked against the archive itself; the scratch
        // location must not be filtered by them.
        let mut inner_ctx = self.ctx.without_progress_bar();
        inner_ctx.options.excluded_path_prefixes.clear();
        let walker = DirectoryWalker::new(inner_ctx);
        let mut matches = Vec::new();

        for archive in &archives {
            if self.ctx.is_cancelled() {
                warn!("Archive search cancelled, returning partial results");
                break;
            }
            tracker.enter_directory(&format!("Archive: {}", archive.display()));
            info!("Searching archive {}", archive.display());
            stats.archives_searched += 1;

            let work_dir = scratch
                .path
                .join(format!("archive_{}", stats.archives_searched));
            if extractor.extract(archive, &work_dir) {
                let (found, inner) = walker.walk(&work_dir, pattern, true);
                matches.extend(
                    found
                        .into_iter()
                        .map(|m| rebase_match(m, archive, &work_dir)),
                );
                stats.files_in_archives_searched += inner.files_searched;
                stats.matches_found += inner.matches_found;
                stats.errors += inner.errors;
            } else {
                stats.errors += 1;
                stats.archives_skipped += 1;
            }

            if work_dir.exists() {
                if let Err(e) = fs::remove_dir_all(&work_dir) {
                    warn!("Failed to remove {}: {e}", work_dir.display());
                }
            }
        }
        drop(scratch);

        let progress = tracker.finish();
        stats.dirs_searched = progress.dirs_searched;
        stats.dirs_skipped = progress.dirs_skipped;
        stats.errors += progress.errors;
        stats.duration_seconds = progress.duration_seconds;
        (matches, stats)
    }

    fn discover(
        &self,
        dir: &Path,
        deadline: Option<Instant>,
        tracker: &ProgressTracker,
        stats: &mut SearchStats,
    ) -> Vec<PathBuf> {
        let opts = &self.ctx.options;
        let searcher = FileSearcher::new(&self.ctx);
        let mut gate = RetryGate::new(opts.timeout_seconds);
        let mut archives = Vec::new();

        let entries = WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if !entry.file_type().is_dir() {
                    return true;
                }
                if entry.depth() > 0 && is_hidden(entry.path()) && !opts.search_hidden_files {
                    return false;
                }
                if !gate.grant_access(entry.path()) {
                    tracker.add_dirs_skipped(1);
                    return false;
                }
                tracker.enter_directory(&entry.path().display().to_string());
                true
            });

        for entry in entries {
            if self.ctx.should_stop(deadline) {
                warn!(
                    "Archive discovery stopped after {} seconds",
                    opts.timeout_seconds
                        .saturating_mul(u64::from(ARCHIVE_TIMEOUT_MULTIPLIER))
                );
                break;
            }
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Error while looking for archives: {e}");
                    tracker.add_dirs_skipped(1);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_archive(entry.path()) {
                continue;
            }
            if searcher.passes_location_filters(entry.path()) {
                archives.push(entry.into_path());
            } else {
                stats.archives_skipped += 1;
            }
        }
        archives
    }
}

fn rebase_match(mut record: MatchRecord, archive: &Path, work_dir: &Path) -> MatchRecord {
    let inner = Path::new(&record.file_path)
        .strip_prefix(work_dir)
        .map(|rel| rel.to_string_lossy().into_owned())
        .unwrap_or_else(|_| record.file_path.clone());
    record.file_path = format!("{}::{}", archive.display(), inner);
    record
}
