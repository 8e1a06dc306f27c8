//! Binary vs. text classification
use lazy_static::lazy_static;
use log::debug;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const SNIFF_SIZE: u64 = 1024;

lazy_static! {
    /// Extensions that are always read as text.
    static ref TEXT_EXTENSIONS: HashSet<&'static str> = [
        "txt", "py", "js", "html", "css", "json", "xml", "csv", "md", "ini", "cfg", "conf", "log",
        "c", "cpp", "h", "hpp", "java", "sh", "bat", "ps1", "yaml", "yml", "sql", "php", "rb",
        "rs", "toml",
    ]
    .into_iter()
    .collect();
}

/// Why a file ended up on the text or binary path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    TextExtension,
    TextMime,
    NulByte,
    Utf8Sample,
    InvalidUtf8,
    Unreadable,
}

impl Classification {
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            Classification::NulByte | Classification::InvalidUtf8 | Classification::Unreadable
        )
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileClassifier;

impl FileClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn is_binary(&self, path: &Path) -> bool {
        self.classify(path).is_binary()
    }

    /// First decisive rule wins: extension, MIME guess, then a content sample.
    pub fn classify(&self, path: &Path) -> Classification {
        if has_text_extension(path) {
            return Classification::TextExtension;
        }

        if let Some(mime) = mime_guess::from_path(path).first_raw() {
            if mime.starts_with("text/")
                || mime.starts_with("application/json")
                || mime.starts_with("application/xml")
            {
                return Classification::TextMime;
            }
        }

        match read_head(path) {
            Ok(sample) => classify_sample(&sample),
            Err(e) => {
                debug!("Could not sample {}: {e}", path.display());
                Classification::Unreadable
            }
        }
    }
}

pub fn has_text_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn classify_sample(sample: &[u8]) -> Classification {
    if memchr::memchr(0, sample).is_some() {
        return Classification::NulByte;
    }
    match std::str::from_utf8(sample) {
        Ok(_) => Classification::Utf8Sample,
        // A multi-byte sequence cut off by the sample boundary is still UTF-8.
        Err(e) if e.error_len().is_none() => Classification::Utf8Sample,
        Err(_) => Classification::InvalidUtf8,
    }
}

fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(SNIFF_SIZE as usize);
    File::open(path)?.take(SNIFF_SIZE).read_to_end(&mut buf)?;
    Ok(buf)
}
