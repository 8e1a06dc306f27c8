use crate::results::SearchStats;
use indicatif::ProgressBar;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(1);
const MAX_DIR_DISPLAY: usize = 50;

struct StatusState {
    current_dir: String,
    last_update: Instant,
    last_status: Option<String>,
}

/// Run counters shared by all workers of one search.
pub struct ProgressTracker {
    files_searched: AtomicU64,
    files_skipped: AtomicU64,
    dirs_searched: AtomicU64,
    dirs_skipped: AtomicU64,
    matches_found: AtomicU64,
    errors: AtomicU64,
    start_time: Instant,
    interval: Duration,
    status: Mutex<StatusState>,
    bar: Option<ProgressBar>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            files_searched: AtomicU64::new(0),
            files_skipped: AtomicU64::new(0),
            dirs_searched: AtomicU64::new(0),
            dirs_skipped: AtomicU64::new(0),
            matches_found: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            start_time: now,
            interval: DEFAULT_UPDATE_INTERVAL,
            status: Mutex::new(StatusState {
                current_dir: String::new(),
                last_update: now,
                last_status: None,
            }),
            bar: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_progress_bar(mut self, bar: Option<ProgressBar>) -> Self {
        self.bar = bar;
        self
    }

    pub fn enter_directory(&self, dir: &str) {
        self.dirs_searched.fetch_add(1, Ordering::Relaxed);
        self.status.lock().current_dir = dir.to_string();
        self.refresh();
    }

    pub fn add_files_searched(&self, n: u64) {
        self.files_searched.fetch_add(n, Ordering::Relaxed);
        self.refresh();
    }

    pub fn add_files_skipped(&self, n: u64) {
        self.files_skipped.fetch_add(n, Ordering::Relaxed);
        self.refresh();
    }

    pub fn add_dirs_skipped(&self, n: u64) {
        self.dirs_skipped.fetch_add(n, Ordering::Relaxed);
        self.refresh();
    }

    pub fn add_matches(&self, n: u64) {
        self.matches_found.fetch_add(n, Ordering::Relaxed);
        self.refresh();
    }

    pub fn add_errors(&self, n: u64) {
        self.errors.fetch_add(n, Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> SearchStats {
        SearchStats {
            files_searched: self.files_searched.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            dirs_searched: self.dirs_searched.load(Ordering::Relaxed),
            dirs_skipped: self.dirs_skipped.load(Ordering::Relaxed),
            matches_found: self.matches_found.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            duration_seconds: self.elapsed().as_secs_f64(),
            ..SearchStats::default()
        }
    }

    /// Current one-line status, regardless of throttling.
    pub fn status_line(&self) -> String {
        let dir = self.status.lock().current_dir.clone();
        format!(
            "Searching: {} | Files: {} | Matches: {} | Time: {:.1}s",
            shorten_dir(&dir),
            self.files_searched.load(Ordering::Relaxed),
            self.matches_found.load(Ordering::Relaxed),
            self.elapsed().as_secs_f64()
        )
    }

    /// The status line published by the most recent throttled refresh.
    pub fn last_status(&self) -> Option<String> {
        self.status.lock().last_status.clone()
    }

    fn refresh(&self) {
        let now = Instant::now();
        {
            let mut state = self.status.lock();
            if now.duration_since(state.last_update) < self.interval {
                return;
            }
            state.last_update = now;
        }
        let line = self.status_line();
        if let Some(bar) = &self.bar {
            bar.set_message(line.clone());
        }
        self.status.lock().last_status = Some(line);
    }

    pub fn finish(&self) -> SearchStats {
        let stats = self.snapshot();
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
        stats
    }
}

fn shorten_dir(dir: &str) -> String {
    let count = dir.chars().count();
    if count <= MAX_DIR_DISPLAY {
        return dir.to_string();
    }
    let tail: String = dir.chars().skip(count - (MAX_DIR_DISPLAY - 3)).collect();
    format!("...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn concurrent_increments_are_not_lost() {
        let tracker = Arc::new(ProgressTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        t.add_files_searched(1);
                        t.add_matches(2);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let stats = tracker.snapshot();
        assert_eq!(stats.files_searched, 8000);
        assert_eq!(stats.matches_found, 16000);
    }

    #[test]
    fn status_is_throttled() {
        let tracker = ProgressTracker::new().with_interval(Duration::from_secs(3600));
        tracker.enter_directory("/tmp/a");
        tracker.add_files_searched(1);
        assert!(tracker.last_status().is_none());

        let tracker = ProgressTracker::new().with_interval(Duration::ZERO);
        tracker.enter_directory("/tmp/a");
        let status = tracker.last_status().unwrap();
        assert!(status.starts_with("Searching: /tmp/a | Files: 0 | Matches: 0"));
    }

    #[test]
    fn long_directories_are_shortened() {
        let dir = format!("/{}", "d".repeat(80));
        let short = shorten_dir(&dir);
        assert_eq!(short.chars().count(), MAX_DIR_DISPLAY);
        assert!(short.starts_with("..."));
        assert!(short.ends_with("ddd"));
    }

    #[test]
    fn snapshot_counts_directories() {
        let tracker = ProgressTracker::new();
        tracker.enter_directory("a");
        tracker.enter_directory("b");
        tracker.add_dirs_skipped(1);
        tracker.add_errors(2);
        let stats = tracker.snapshot();
        assert_eq!(stats.dirs_searched, 2);
        assert_eq!(stats.dirs_skipped, 1);
        assert_eq!(stats.errors, 2);
        assert!(stats.duration_seconds >= 0.0);
    }
}
