pub mod app;
pub mod archive;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod context;
pub mod encoding;
pub mod error;
pub mod gate;
pub mod interactive;
pub mod matcher;
pub mod options;
pub mod output;
pub mod processor;
pub mod progress;
pub mod results;
pub mod walker;

pub use archive::{ArchiveExtractor, ArchiveSearcher};
pub use classifier::FileClassifier;
pub use config::Config;
pub use context::SearchContext;
pub use encoding::{ChardetDetector, EncodingDetector, Utf8Detector, detect_encoding};
pub use error::{FilederError, Result};
pub use gate::RetryGate;
pub use options::{SearchOptions, SearchPattern};
pub use processor::FileSearcher;
pub use progress::ProgressTracker;
pub use results::{MatchRecord, SavedSearch, SearchStats, list_saved_results, load_results, save_results};
pub use walker::DirectoryWalker;
