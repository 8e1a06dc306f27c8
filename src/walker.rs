//! Bounded recursive directory traversal
use crate::context::SearchContext;
use crate::gate::RetryGate;
use crate::options::SearchPattern;
use crate::processor::FileSearcher;
use crate::progress::ProgressTracker;
use crate::results::{MatchRecord, SearchStats};
use log::{debug, error, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Upper bound on file-search workers per walk.
pub const MAX_WORKERS: usize = 32;

pub fn worker_count() -> usize {
    num_cpus::get().clamp(1, MAX_WORKERS)
}

enum FileOutcome {
    Searched(Vec<MatchRecord>),
    Skipped,
    NotRun,
}

/// Walks a directory tree and searches its files, one directory level at a time.
///
/// Files of one directory are searched concurrently; subdirectories are
/// visited depth-first and sequentially afterwards, so at most one batch of
/// file searches is in flight.
pub struct DirectoryWalker {
    ctx: SearchContext,
    pool: Option<ThreadPool>,
}

impl DirectoryWalker {
    pub fn new(ctx: SearchContext) -> Self {
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_count())
            .thread_name(|i| format!("fileder-worker-{i}"))
            .build()
            .map_err(|e| warn!("Falling back to the global thread pool: {e}"))
            .ok();
        Self { ctx, pool }
    }

    pub fn context(&self) -> &SearchContext {
        &self.ctx
    }

    /// Searches `root`; only a root that is not a directory is reported as a
    /// failure (no matches, one error in the stats).
    pub fn walk(
        &self,
        root: &Path,
        pattern: &SearchPattern,
        recursive: bool,
    ) -> (Vec<MatchRecord>, SearchStats) {
        let deadline = self.ctx.deadline(Instant::now(), 1);
        self.walk_until(root, pattern, recursive, deadline)
    }

    /// Like [`walk`](Self::walk), but stops at an explicit deadline instead of
    /// one derived from the configured timeout.
    pub fn walk_until(
        &self,
        root: &Path,
        pattern: &SearchPattern,
        recursive: bool,
        deadline: Option<Instant>,
    ) -> (Vec<MatchRecord>, SearchStats) {
        let tracker = self.ctx.new_tracker();
        if !root.is_dir() {
            error!("Not a directory: {}", root.display());
            tracker.add_errors(1);
            return (Vec::new(), tracker.finish());
        }

        let mut run = WalkRun::new(self, pattern, recursive, deadline, tracker);
        run.run(root);

        let stats = run.tracker.finish();
        debug!(
            "Walk of {} finished: {} files, {} matches",
            root.display(),
            stats.files_searched,
            stats.matches_found
        );
        (run.matches, stats)
    }
}

struct WalkRun<'a> {
    ctx: &'a SearchContext,
    searcher: FileSearcher<'a>,
    pattern: &'a SearchPattern,
    recursive: bool,
    gate: RetryGate,
    deadline: Option<Instant>,
    pool: Option<&'a ThreadPool>,
    tracker: ProgressTracker,
    matches: Vec<MatchRecord>,
}

impl<'a> WalkRun<'a> {
    fn new(
        walker: &'a DirectoryWalker,
        pattern: &'a SearchPattern,
        recursive: bool,
        deadline: Option<Instant>,
        tracker: ProgressTracker,
    ) -> Self {
        let ctx = &walker.ctx;
        Self {
            ctx,
            searcher: FileSearcher::new(ctx),
            pattern,
            recursive,
            gate: RetryGate::new(ctx.options.timeout_seconds),
            deadline,
            pool: walker.pool.as_ref(),
            tracker,
            matches: Vec::new(),
        }
    }

    fn run(&mut self, root: &Path) {
        let mut stack: Vec<(PathBuf, usize)> = vec![(root.to_path_buf(), 0)];
        while let Some((dir, depth)) = stack.pop() {
            if self.stop_requested() {
                break;
            }
            let subdirs = self.visit(&dir, depth);
            stack.extend(subdirs.into_iter().rev().map(|d| (d, depth + 1)));
        }
    }

    fn stop_requested(&self) -> bool {
        if self.ctx.is_cancelled() {
            warn!("Search cancelled, returning partial results");
            return true;
        }
        if self.ctx.should_stop(self.deadline) {
            warn!(
                "Global timeout after {} seconds, returning partial results",
                self.ctx.options.timeout_seconds
            );
            return true;
        }
        false
    }

    /// Searches the files of one directory and returns the subdirectories to visit.
    fn visit(&mut self, dir: &Path, depth: usize) -> Vec<PathBuf> {
        let max_depth = self.ctx.options.max_depth;
        if max_depth > 0 && depth > max_depth {
            debug!("Max depth {max_depth} reached, skipping {}", dir.display());
            self.tracker.add_dirs_skipped(1);
            return Vec::new();
        }

        if !self.gate.grant_access(dir) {
            self.tracker.add_dirs_skipped(1);
            return Vec::new();
        }

        self.tracker.enter_directory(&dir.display().to_string());

        let (files, subdirs) = match list_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Error listing directory {}: {e}", dir.display());
                self.tracker.add_errors(1);
                self.tracker.add_dirs_skipped(1);
                return Vec::new();
            }
        };

        self.search_files(files);

        if !self.recursive {
            return Vec::new();
        }
        let show_hidden = self.ctx.options.search_hidden_files;
        subdirs
            .into_iter()
            .filter(|d| show_hidden || !is_hidden(d))
            .collect()
    }

    fn search_files(&mut self, files: Vec<PathBuf>) {
        let searcher = &self.searcher;
        let tracker = &self.tracker;
        let pattern = self.pattern;
        let ctx = self.ctx;
        let deadline = self.deadline;

        let job = || -> Vec<FileOutcome> {
            files
                .par_iter()
                .map(|path| {
                    if ctx.should_stop(deadline) {
                        return FileOutcome::NotRun;
                    }
                    search_one(searcher, tracker, path, pattern)
                })
                .collect()
        };
        let outcomes = match self.pool {
            Some(pool) => pool.install(job),
            None => job(),
        };

        for outcome in outcomes {
            match outcome {
                FileOutcome::Searched(found) => self.matches.extend(found),
                FileOutcome::Skipped | FileOutcome::NotRun => {}
            }
        }
    }
}

fn search_one(
    searcher: &FileSearcher<'_>,
    tracker: &ProgressTracker,
    path: &Path,
    pattern: &SearchPattern,
) -> FileOutcome {
    if !searcher.should_process(path) {
        tracker.add_files_skipped(1);
        return FileOutcome::Skipped;
    }

    match catch_unwind(AssertUnwindSafe(|| searcher.scan(path, pattern))) {
        Ok(Ok(found)) => {
            tracker.add_files_searched(1);
            tracker.add_matches(found.len() as u64);
            FileOutcome::Searched(found)
        }
        Ok(Err(e)) => {
            warn!("Error searching {}: {e}", path.display());
            tracker.add_errors(1);
            tracker.add_files_searched(1);
            FileOutcome::Searched(Vec::new())
        }
        Err(_) => {
            error!("Worker failed while searching {}", path.display());
            tracker.add_errors(1);
            tracker.add_files_skipped(1);
            FileOutcome::Skipped
        }
    }
}

/// Splits a directory into regular files and real subdirectories, both sorted.
///
/// Symlinks to files are searched; symlinks to directories are not followed.
fn list_dir(dir: &Path) -> std::io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("Unreadable entry in {}: {e}", dir.display());
                continue;
            }
        };
        let path = entry.path();
        match entry.file_type() {
            Ok(ft) if ft.is_dir() => subdirs.push(path),
            Ok(ft) if ft.is_file() => files.push(path),
            Ok(ft) if ft.is_symlink() => {
                if path.is_file() {
                    files.push(path);
                }
            }
            Ok(_) => {}
            Err(e) => debug!("Cannot determine type of {}: {e}", path.display()),
        }
    }
    files.sort();
    subdirs.sort();
    Ok((files, subdirs))
}

pub(crate) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
