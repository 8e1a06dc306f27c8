//! Search inputs: the literal pattern and the per-run option bundle
use crate::error::{FilederError, Result};
use std::path::{Path, PathBuf};

pub const MB: u64 = 1024 * 1024;

/// A literal search string plus its case-sensitivity flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPattern {
    text: String,
    case_sensitive: bool,
}

impl SearchPattern {
    pub fn new(text: impl Into<String>, case_sensitive: bool) -> Result<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(FilederError::InvalidPattern(
                "pattern must not be empty".to_string(),
            ));
        }
        Ok(Self {
            text,
            case_sensitive,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}

/// Read-only limits and filters applied during one search run.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub context_chars: usize,
    pub max_file_size_bytes: u64,
    pub search_hidden_files: bool,
    /// 0 = unlimited
    pub timeout_seconds: u64,
    /// 0 = unlimited
    pub max_depth: usize,
    pub excluded_extensions: Vec<String>,
    pub included_extensions: Vec<String>,
    pub excluded_path_prefixes: Vec<PathBuf>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            context_chars: 20,
            max_file_size_bytes: 100 * MB,
            search_hidden_files: false,
            timeout_seconds: 10,
            max_depth: 5,
            excluded_extensions: Vec::new(),
            included_extensions: Vec::new(),
            excluded_path_prefixes: Vec::new(),
        }
    }
}

impl SearchOptions {
    pub fn with_excluded_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_extensions = normalize_extensions(exts);
        self
    }

    pub fn with_included_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.included_extensions = normalize_extensions(exts);
        self
    }

    pub fn with_excluded_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_path_prefixes = paths
            .into_iter()
            .filter_map(|p| {
                let p = p.as_ref().trim();
                (!p.is_empty()).then(|| expand_home(p))
            })
            .collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_file_size_bytes == 0 {
            return Err(FilederError::Config(
                "max file size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_excluded_extension(&self, path: &Path) -> bool {
        has_suffix_in(path, &self.excluded_extensions)
    }

    /// True when no include list is set or the file matches it.
    pub fn is_included_extension(&self, path: &Path) -> bool {
        self.included_extensions.is_empty() || has_suffix_in(path, &self.included_extensions)
    }

    pub fn is_excluded_path(&self, path: &Path) -> bool {
        let normalized = crate::gate::normalize_path(path);
        self.excluded_path_prefixes
            .iter()
            .any(|prefix| normalized.starts_with(crate::gate::normalize_path(prefix)))
    }
}

/// Lower-cases entries and makes sure each one starts with a dot.
pub fn normalize_extensions<I, S>(exts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    exts.into_iter()
        .filter_map(|e| {
            let e = e.as_ref().trim().to_lowercase();
            if e.is_empty() {
                None
            } else if e.starts_with('.') {
                Some(e)
            } else {
                Some(format!(".{e}"))
            }
        })
        .collect()
}

fn has_suffix_in(path: &Path, suffixes: &[String]) -> bool {
    let name = match path.file_name() {
        Some(n) => n.to_string_lossy().to_lowercase(),
        None => return false,
    };
    suffixes.iter().any(|s| name.ends_with(s.as_str()))
}

fn expand_home(p: &str) -> PathBuf {
    if let Some(rest) = p.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches(['/', '\\']));
        }
    }
    PathBuf::from(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pattern_is_rejected() {
        assert!(SearchPattern::new("", true).is_err());
        assert!(SearchPattern::new("x", false).is_ok());
    }

    #[test]
    fn extensions_are_normalized() {
        let exts = normalize_extensions(["TXT", " .Log ", "", "tar.gz"]);
        assert_eq!(exts, vec![".txt", ".log", ".tar.gz"]);
    }

    #[test]
    fn multi_part_extension_matches_suffix() {
        let opts = SearchOptions::default().with_excluded_extensions([".tar.gz"]);
        assert!(opts.is_excluded_extension(Path::new("/a/b/backup.TAR.GZ")));
        assert!(!opts.is_excluded_extension(Path::new("/a/b/file.gz")));
    }

    #[test]
    fn include_list_empty_allows_everything() {
        let opts = SearchOptions::default();
        assert!(opts.is_included_extension(Path::new("x.anything")));
        let opts = opts.with_included_extensions(["rs"]);
        assert!(opts.is_included_extension(Path::new("main.rs")));
        assert!(!opts.is_included_extension(Path::new("main.py")));
    }

    #[test]
    fn excluded_paths_match_by_component() {
        let opts = SearchOptions::default().with_excluded_paths(["/data/cache", " "]);
        assert_eq!(opts.excluded_path_prefixes.len(), 1);
        assert!(opts.is_excluded_path(Path::new("/data/cache/x.txt")));
        assert!(opts.is_excluded_path(Path::new("/data/./cache/sub/y.txt")));
        assert!(!opts.is_excluded_path(Path::new("/data/cache2/x.txt")));
    }

    #[test]
    fn zero_max_size_is_invalid() {
        let opts = SearchOptions {
            max_file_size_bytes: 0,
            ..SearchOptions::default()
        };
        assert!(opts.validate().is_err());
    }
}
