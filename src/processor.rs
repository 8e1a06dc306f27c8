use crate::classifier::FileClassifier;
use crate::context::SearchContext;
use crate::error::Result;
use crate::matcher::LiteralMatcher;
use crate::options::{MB, SearchPattern};
use crate::results::MatchRecord;
use encoding_rs::Encoding;
use log::{debug, warn};
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;

/// Files at least this large are memory-mapped on the binary path.
const MMAP_THRESHOLD: u64 = 16 * MB;
/// Share of replacement characters above which decoded text is treated as unusable.
const MAX_REPLACEMENT_RATIO: f64 = 0.5;

enum FileBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileBytes::Mapped(m) => m,
            FileBytes::Owned(v) => v,
        }
    }
}

/// Searches single files for a literal pattern.
pub struct FileSearcher<'a> {
    ctx: &'a SearchContext,
    classifier: FileClassifier,
}

impl<'a> FileSearcher<'a> {
    pub fn new(ctx: &'a SearchContext) -> Self {
        Self {
            ctx,
            classifier: FileClassifier::new(),
        }
    }

    /// Pre-filter: hidden files, size limit, excluded paths and extension lists.
    pub fn should_process(&self, path: &Path) -> bool {
        let opts = &self.ctx.options;
        if !self.passes_location_filters(path) {
            return false;
        }

        if opts.is_excluded_extension(path) {
            debug!("Skipping excluded extension: {}", path.display());
            return false;
        }

        if !opts.is_included_extension(path) {
            debug!("Skipping file outside included extensions: {}", path.display());
            return false;
        }

        true
    }

    /// The part of [`should_process`](Self::should_process) that ignores
    /// extensions: hidden files, size limit and excluded paths.
    pub fn passes_location_filters(&self, path: &Path) -> bool {
        let opts = &self.ctx.options;

        let hidden = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with('.'))
            .unwrap_or(false);
        if hidden && !opts.search_hidden_files {
            debug!("Skipping hidden file: {}", path.display());
            return false;
        }

        match path.metadata() {
            Ok(meta) if meta.len() > opts.max_file_size_bytes => {
                debug!(
                    "Skipping large file: {} ({:.2} MB)",
                    path.display(),
                    meta.len() as f64 / MB as f64
                );
                return false;
            }
            Ok(_) => {}
            Err(e) => {
                debug!("Cannot stat {}: {e}", path.display());
                return false;
            }
        }

        if opts.is_excluded_path(path) {
            debug!("Skipping file in excluded path: {}", path.display());
            return false;
        }

        true
    }

    /// Never fails: rejected or failing files yield no matches.
    pub fn search_file(&self, path: &Path, pattern: &SearchPattern) -> Vec<MatchRecord> {
        if !self.should_process(path) {
            return Vec::new();
        }
        match self.scan(path, pattern) {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Error searching {}: {e}", path.display());
                Vec::new()
            }
        }
    }

    /// Searches a file that already passed [`should_process`](Self::should_process).
    pub fn scan(&self, path: &Path, pattern: &SearchPattern) -> Result<Vec<MatchRecord>> {
        let file = match File::open(path) {
            Ok(f) if path.is_file() => f,
            Ok(_) => return Ok(Vec::new()),
            Err(e) => {
                debug!("Cannot open {}: {e}", path.display());
                return Ok(Vec::new());
            }
        };

        if self.classifier.is_binary(path) {
            let content = self.read_bounded(file, pattern.case_sensitive())?;
            return Ok(self.search_binary(path, &content, pattern));
        }

        let encoding = self.ctx.detector.detect(path);
        let content = self.read_bounded(file, false)?;
        match decode_text(encoding, &content) {
            Some(text) => Ok(self.search_text(path, &text, pattern)),
            None => {
                debug!(
                    "Undecodable as {}, falling back to binary search: {}",
                    encoding.name(),
                    path.display()
                );
                Ok(self.search_binary(path, &content, pattern))
            }
        }
    }

    /// Only case-sensitive binary reads within the size limit are mapped.
    fn should_map(&self, len: u64, case_sensitive: bool) -> bool {
        case_sensitive && len >= MMAP_THRESHOLD && len <= self.ctx.options.max_file_size_bytes
    }

    fn read_bounded(&self, file: File, case_sensitive_binary: bool) -> Result<FileBytes> {
        let limit = self.ctx.options.max_file_size_bytes;
        let len = file.metadata()?.len();
        if self.should_map(len, case_sensitive_binary) {
            // SAFETY: the map is read-only and dropped before the search returns.
            let map = unsafe { Mmap::map(&file)? };
            return Ok(FileBytes::Mapped(map));
        }
        let mut buf = Vec::with_capacity(len.min(limit) as usize);
        file.take(limit).read_to_end(&mut buf)?;
        Ok(FileBytes::Owned(buf))
    }

    fn search_binary(
        &self,
        path: &Path,
        content: &[u8],
        pattern: &SearchPattern,
    ) -> Vec<MatchRecord> {
        let matcher = LiteralMatcher::bytes(pattern.text().as_bytes(), pattern.case_sensitive());
        let ctx_chars = self.ctx.options.context_chars;
        let needle_len = matcher.needle_len();

        matcher
            .find_in_bytes(content)
            .into_iter()
            .map(|pos| {
                let start = pos.saturating_sub(ctx_chars);
                let end = pos
                    .saturating_add(needle_len)
                    .saturating_add(ctx_chars)
                    .min(content.len());
                MatchRecord::binary(path, pos, &content[start..end])
            })
            .collect()
    }

    fn search_text(&self, path: &Path, text: &str, pattern: &SearchPattern) -> Vec<MatchRecord> {
        let matcher = LiteralMatcher::text(pattern.text(), pattern.case_sensitive());
        let ctx_chars = self.ctx.options.context_chars;
        let pattern_chars = pattern.text().chars().count();
        let mut results = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let positions = matcher.find_in_line(line);
            if positions.is_empty() {
                continue;
            }
            let chars: Vec<char> = line.chars().collect();
            for pos in positions {
                let start = pos.saturating_sub(ctx_chars);
                let end = pos
                    .saturating_add(pattern_chars)
                    .saturating_add(ctx_chars)
                    .min(chars.len());
                let context: String = chars[start..end].iter().collect();
                results.push(MatchRecord::text(
                    path,
                    idx + 1,
                    pos,
                    context.trim().to_string(),
                ));
            }
        }
        results
    }
}

/// Decodes with replacement; `None` when the result is mostly replacement characters.
fn decode_text(encoding: &'static Encoding, content: &[u8]) -> Option<String> {
    let (text, _, had_errors) = encoding.decode(content);
    if had_errors {
        let total = text.chars().count().max(1);
        let replaced = text.chars().filter(|&c| c == char::REPLACEMENT_CHARACTER).count();
        if replaced as f64 / total as f64 > MAX_REPLACEMENT_RATIO {
            return None;
        }
    }
    Some(text.into_owned())
}
