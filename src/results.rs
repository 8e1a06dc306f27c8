//! Match records, run statistics and JSON persistence of finished searches
use crate::error::Result;
use anyhow::Context;
use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Format of the `timestamp` field and of the saved file name suffix.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const SAFE_PATTERN_LEN: usize = 20;

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^\w]").unwrap();
}

/// One located occurrence of the pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(rename = "file")]
    pub file_path: String,
    /// 1-based line, or -1 for binary matches.
    pub line_number: i64,
    /// Byte offset in the file (binary) or character offset in the line (text).
    #[serde(rename = "position")]
    pub byte_position: usize,
    /// Trimmed text, or the surrounding bytes as lower-case hex for binary matches.
    pub context: String,
    pub is_binary: bool,
}

impl MatchRecord {
    pub fn text(file_path: &Path, line_number: usize, position: usize, context: String) -> Self {
        Self {
            file_path: file_path.display().to_string(),
            line_number: line_number as i64,
            byte_position: position,
            context,
            is_binary: false,
        }
    }

    pub fn binary(file_path: &Path, position: usize, context: &[u8]) -> Self {
        Self {
            file_path: file_path.display().to_string(),
            line_number: -1,
            byte_position: position,
            context: to_hex(context),
            is_binary: true,
        }
    }
}

/// Counters of one search run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub files_searched: u64,
    pub files_skipped: u64,
    pub dirs_searched: u64,
    pub dirs_skipped: u64,
    pub matches_found: u64,
    pub errors: u64,
    pub duration_seconds: f64,
    #[serde(default)]
    pub archives_searched: u64,
    #[serde(default)]
    pub archives_skipped: u64,
    #[serde(default)]
    pub files_in_archives_searched: u64,
}

/// A finished search as written to and read from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSearch {
    pub search_pattern: String,
    pub directory: String,
    pub timestamp: String,
    pub stats: SearchStats,
    pub results: Vec<MatchRecord>,
}

impl SavedSearch {
    pub fn new(
        pattern: &str,
        directory: &Path,
        matches: Vec<MatchRecord>,
        stats: SearchStats,
    ) -> Self {
        Self {
            search_pattern: pattern.to_string(),
            directory: directory.display().to_string(),
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            stats,
            results: matches,
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "search_{}_{}.json",
            safe_pattern(&self.search_pattern),
            self.timestamp
        )
    }
}

/// Writes the search into `folder` and returns the created file.
pub fn save_results(
    folder: &Path,
    pattern: &str,
    directory: &Path,
    matches: &[MatchRecord],
    stats: &SearchStats,
) -> Result<PathBuf> {
    let saved = SavedSearch::new(pattern, directory, matches.to_vec(), stats.clone());
    write_saved(folder, &saved)
}

pub fn write_saved(folder: &Path, saved: &SavedSearch) -> Result<PathBuf> {
    fs::create_dir_all(folder)
        .with_context(|| format!("Failed to create results folder: {}", folder.display()))?;
    let path = folder.join(saved.file_name());
    let json = serde_json::to_string_pretty(saved)?;
    fs::write(&path, json)
        .with_context(|| format!("Failed to write results file: {}", path.display()))?;
    info!("Results saved to {}", path.display());
    Ok(path)
}

pub fn load_results(path: &Path) -> Result<SavedSearch> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read results file: {}", path.display()))?;
    let saved = serde_json::from_str(&content)?;
    info!("Results loaded from {}", path.display());
    Ok(saved)
}

/// `search_*.json` files in `folder`, sorted by name. A missing folder is empty.
pub fn list_saved_results(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("search_") && n.ends_with(".json"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

pub fn safe_pattern(pattern: &str) -> String {
    UNSAFE_CHARS
        .replace_all(pattern, "_")
        .chars()
        .take(SAFE_PATTERN_LEN)
        .collect()
}

pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
