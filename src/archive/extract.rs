use crate::error::{FilederError, Result};
use crate::options::SearchOptions;
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tar::EntryType;
use zip::ZipArchive;

/// Maximum number of entries accepted in a ZIP or TAR archive.
pub const MAX_ENTRIES: usize = 1000;
/// Uncompressed content may be at most this multiple of the file size limit.
pub const EXPANSION_FACTOR: u64 = 10;

const SIGNATURE_LEN: usize = 262;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
    Gz,
}

impl ArchiveKind {
    /// Archive kind by file name; `.tar.gz` wins over plain `.gz`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".gz") {
            Some(ArchiveKind::Gz)
        } else {
            None
        }
    }

    fn signature_matches(self, head: &[u8]) -> bool {
        match self {
            ArchiveKind::Zip => infer::archive::is_zip(head),
            ArchiveKind::TarGz | ArchiveKind::Gz => infer::archive::is_gz(head),
        }
    }
}

pub fn is_archive(path: &Path) -> bool {
    ArchiveKind::from_path(path).is_some()
}

/// Unpacks ZIP, TAR+GZIP and GZIP files after checking them against size and
/// entry-count limits.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveExtractor {
    max_file_size: u64,
}

impl ArchiveExtractor {
    pub fn new(options: &SearchOptions) -> Self {
        Self {
            max_file_size: options.max_file_size_bytes,
        }
    }

    pub fn expansion_limit(&self) -> u64 {
        self.max_file_size.saturating_mul(EXPANSION_FACTOR)
    }

    /// Extracts `archive` into `dest`. Every rejection or failure is logged
    /// and reported as `false`; `dest` may then hold partial output.
    pub fn extract(&self, archive: &Path, dest: &Path) -> bool {
        match self.try_extract(archive, dest) {
            Ok(()) => {
                info!("Extracted {} to {}", archive.display(), dest.display());
                true
            }
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }

    pub fn try_extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        let kind = ArchiveKind::from_path(archive)
            .ok_or_else(|| FilederError::archive(archive, "unsupported archive type"))?;
        self.check_source(archive)?;
        check_signature(archive, kind)?;
        fs::create_dir_all(dest)?;

        match kind {
            ArchiveKind::Zip => self.extract_zip(archive, dest),
            ArchiveKind::TarGz => self.extract_tar_gz(archive, dest),
            ArchiveKind::Gz => self.extract_gz(archive, dest),
        }
    }

    fn check_source(&self, archive: &Path) -> Result<()> {
        let meta = fs::metadata(archive)
            .map_err(|e| FilederError::archive(archive, format!("cannot access: {e}")))?;
        if !meta.is_file() {
            return Err(FilederError::archive(archive, "not a regular file"));
        }
        File::open(archive)
            .map_err(|e| FilederError::archive(archive, format!("not readable: {e}")))?;
        if meta.len() > self.max_file_size {
            return Err(FilederError::archive(
                archive,
                format!(
                    "size {} exceeds limit of {} bytes",
                    meta.len(),
                    self.max_file_size
                ),
            ));
        }
        Ok(())
    }

    fn extract_zip(&self, archive: &Path, dest: &Path) -> Result<()> {
        let mut zip = ZipArchive::new(BufReader::new(File::open(archive)?))?;
        if zip.len() > MAX_ENTRIES {
            return Err(too_many_entries(archive, zip.len()));
        }

        let limit = self.expansion_limit();
        let mut declared: u64 = 0;
        for i in 0..zip.len() {
            let entry = zip.by_index_raw(i)?;
            if entry.enclosed_name().is_none() {
                return Err(unsafe_entry(archive, entry.name()));
            }
            declared = declared.saturating_add(entry.size());
            if declared > limit {
                return Err(too_large(archive, limit));
            }
        }

        let mut written: u64 = 0;
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            let rel = entry
                .enclosed_name()
                .ok_or_else(|| unsafe_entry(archive, entry.name()))?;
            let out_path = dest.join(rel);

            if entry.is_dir() {
                fs::create_dir_all(&out_path)?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&out_path)?;
            let remaining = limit - written;
            let copied = io::copy(&mut (&mut entry).take(remaining + 1), &mut out)?;
            if copied > remaining {
                return Err(too_large(archive, limit));
            }
            written += copied;
        }
        debug!("Unpacked {} ZIP entries from {}", zip.len(), archive.display());
        Ok(())
    }

    fn extract_tar_gz(&self, archive: &Path, dest: &Path) -> Result<()> {
        let limit = self.expansion_limit();

        let mut tar = open_tar_gz(archive)?;
        let mut count = 0;
        let mut declared: u64 = 0;
        for entry in tar.entries()? {
            let entry = entry?;
            count += 1;
            if count > MAX_ENTRIES {
                return Err(too_many_entries(archive, count));
            }
            let name = entry.path()?;
            if !is_safe_entry_path(&name) {
                return Err(unsafe_entry(archive, &name.to_string_lossy()));
            }
            declared = declared.saturating_add(entry.header().size()?);
            if declared > limit {
                return Err(too_large(archive, limit));
            }
        }

        let mut tar = open_tar_gz(archive)?;
        for entry in tar.entries()? {
            let mut entry = entry?;
            match entry.header().entry_type() {
                EntryType::Regular | EntryType::Directory => {
                    if !entry.unpack_in(dest)? {
                        return Err(unsafe_entry(archive, &entry.path()?.to_string_lossy()));
                    }
                }
                other => debug!(
                    "Ignoring TAR entry {} of type {other:?}",
                    entry.path()?.display()
                ),
            }
        }
        debug!("Unpacked {count} TAR entries from {}", archive.display());
        Ok(())
    }

    fn extract_gz(&self, archive: &Path, dest: &Path) -> Result<()> {
        let out_path = dest.join(gz_output_name(archive));
        let limit = self.expansion_limit();

        let mut decoder = GzDecoder::new(BufReader::new(File::open(archive)?));
        let mut out = File::create(&out_path)?;
        let copied = io::copy(&mut (&mut decoder).take(limit + 1), &mut out);
        drop(out);

        match copied {
            Ok(n) if n > limit => {
                remove_partial(&out_path);
                Err(too_large(archive, limit))
            }
            Ok(_) => Ok(()),
            Err(e) => {
                remove_partial(&out_path);
                Err(FilederError::archive(archive, format!("corrupt GZIP stream: {e}")))
            }
        }
    }
}

fn check_signature(archive: &Path, kind: ArchiveKind) -> Result<()> {
    let mut head = Vec::with_capacity(SIGNATURE_LEN);
    File::open(archive)?
        .take(SIGNATURE_LEN as u64)
        .read_to_end(&mut head)?;
    if kind.signature_matches(&head) {
        Ok(())
    } else {
        Err(FilederError::archive(archive, "bad signature"))
    }
}

fn open_tar_gz(archive: &Path) -> Result<tar::Archive<GzDecoder<BufReader<File>>>> {
    let file = File::open(archive)?;
    Ok(tar::Archive::new(GzDecoder::new(BufReader::new(file))))
}

/// Relative, and never climbing out of the destination.
fn is_safe_entry_path(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// `notes.txt.gz` → `notes.txt`.
fn gz_output_name(archive: &Path) -> PathBuf {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = if name.to_lowercase().ends_with(".gz") {
        &name[..name.len() - 3]
    } else {
        name.as_str()
    };
    if stem.is_empty() {
        PathBuf::from("decompressed")
    } else {
        PathBuf::from(stem)
    }
}

fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        debug!("Could not remove partial output {}: {e}", path.display());
    }
}

fn too_many_entries(archive: &Path, count: usize) -> FilederError {
    FilederError::archive(
        archive,
        format!("{count} entries exceed the limit of {MAX_ENTRIES}"),
    )
}

fn too_large(archive: &Path, limit: u64) -> FilederError {
    FilederError::archive(
        archive,
        format!("uncompressed content exceeds {limit} bytes"),
    )
}

fn unsafe_entry(archive: &Path, name: &str) -> FilederError {
    FilederError::archive(archive, format!("unsafe entry path '{name}'"))
}
