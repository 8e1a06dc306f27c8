use crate::encoding::{ChardetDetector, EncodingDetector};
use crate::options::SearchOptions;
use crate::progress::ProgressTracker;
use indicatif::ProgressBar;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Everything a search run needs besides the root and the pattern.
///
/// Built once by the caller and handed to the walkers; nothing in the core
/// reads global state.
#[derive(Clone)]
pub struct SearchContext {
    pub options: SearchOptions,
    pub detector: Arc<dyn EncodingDetector>,
    cancel: Arc<AtomicBool>,
    progress_bar: Option<ProgressBar>,
}

impl SearchContext {
    pub fn new(options: SearchOptions) -> Self {
        Self {
            options,
            detector: Arc::new(ChardetDetector),
            cancel: Arc::new(AtomicBool::new(false)),
            progress_bar: None,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn EncodingDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress_bar(mut self, bar: ProgressBar) -> Self {
        self.progress_bar = Some(bar);
        self
    }

    /// Same run, but without status output; used for nested walks.
    pub fn without_progress_bar(&self) -> Self {
        Self {
            progress_bar: None,
            ..self.clone()
        }
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn new_tracker(&self) -> ProgressTracker {
        ProgressTracker::new().with_progress_bar(self.progress_bar.clone())
    }

    /// Wall-clock deadline for a run started at `start`; `None` when unlimited.
    ///
    /// A timeout too large to represent as an `Instant` is treated as unlimited.
    pub fn deadline(&self, start: Instant, multiplier: u32) -> Option<Instant> {
        match self.options.timeout_seconds {
            0 => None,
            secs => Duration::from_secs(secs)
                .checked_mul(multiplier)
                .and_then(|d| start.checked_add(d)),
        }
    }

    /// True once the run was cancelled or its deadline has passed.
    pub fn should_stop(&self, deadline: Option<Instant>) -> bool {
        self.is_cancelled() || deadline.is_some_and(|d| Instant::now() > d)
    }
}

impl std::fmt::Debug for SearchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchContext")
            .field("options", &self.options)
            .field("cancelled", &self.is_cancelled())
            .field("progress_bar", &self.progress_bar.is_some())
            .finish()
    }
}
