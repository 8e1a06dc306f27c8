//! Best-effort text encoding detection
use encoding_rs::{Encoding, UTF_8};
use log::debug;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Upper bound on the sample read from the start of a file.
pub const SAMPLE_LIMIT: u64 = 1024 * 1024;

/// Guesses the byte encoding of a text file.
///
/// Implementations never fail: anything that goes wrong degrades to UTF-8.
#[cfg_attr(test, mockall::automock)]
pub trait EncodingDetector: Send + Sync {
    fn detect(&self, path: &Path) -> &'static Encoding;
}

/// Always answers UTF-8.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8Detector;

impl EncodingDetector for Utf8Detector {
    fn detect(&self, _path: &Path) -> &'static Encoding {
        UTF_8
    }
}

/// BOM sniffing first, then a `chardetng` guess over the sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChardetDetector;

impl EncodingDetector for ChardetDetector {
    fn detect(&self, path: &Path) -> &'static Encoding {
        match read_sample(path) {
            Ok(sample) => guess_encoding(&sample),
            Err(e) => {
                debug!("Encoding detection failed for {}: {e}", path.display());
                UTF_8
            }
        }
    }
}

/// Name of the detected encoding, e.g. `"UTF-8"` or `"windows-1252"`.
pub fn detect_encoding(detector: &dyn EncodingDetector, path: &Path) -> &'static str {
    detector.detect(path).name()
}

pub fn guess_encoding(sample: &[u8]) -> &'static Encoding {
    if sample.is_empty() {
        return UTF_8;
    }
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return encoding;
    }
    if std::str::from_utf8(sample).is_ok() {
        return UTF_8;
    }
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(sample, true);
    detector.guess(None, true)
}

fn read_sample(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let len = file.metadata()?.len().min(SAMPLE_LIMIT);
    let mut buf = Vec::with_capacity(len as usize);
    file.take(len).read_to_end(&mut buf)?;
    Ok(buf)
}
