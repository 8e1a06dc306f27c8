use fileder::archive::{ArchiveExtractor, ArchiveSearcher, MAX_ENTRIES};
use fileder::{SearchContext, SearchOptions, SearchPattern};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

fn options() -> SearchOptions {
    SearchOptions {
        timeout_seconds: 0,
        max_depth: 0,
        ..SearchOptions::default()
    }
}

fn searcher(scratch: &Path) -> ArchiveSearcher {
    ArchiveSearcher::new(SearchContext::new(options())).with_scratch_root(scratch)
}

fn write_zip(path: &Path, entries: &[(String, Vec<u8>)]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, data) in entries {
        zip.start_file(name.as_str(), SimpleFileOptions::default())
            .unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

/// Builds a `.tar.gz` whose entry names are written verbatim into the headers.
fn write_raw_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
    let enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    let mut builder = tar::Builder::new(enc);
    for (name, data) in entries {
        let mut header = tar::Header::new_old();
        let raw = name.as_bytes();
        header.as_old_mut().name[..raw.len()].copy_from_slice(raw);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

fn pattern(text: &str) -> SearchPattern {
    SearchPattern::new(text, false).unwrap()
}

#[test]
fn zip_matches_reference_the_archive() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    fs::create_dir(&data).unwrap();
    let archive = data.join("bundle.zip");
    write_zip(
        &archive,
        &[
            ("inner.txt".to_string(), b"the secret word".to_vec()),
            ("docs/readme.md".to_string(), b"no secret\nsecret".to_vec()),
        ],
    );

    let scratch = tmp.path().join("scratch");
    let (matches, stats) = searcher(&scratch).search_archives(&data, &pattern("SECRET"));

    let files: Vec<_> = matches.iter().map(|m| m.file_path.clone()).collect();
    assert!(files.contains(&format!("{}::inner.txt", archive.display())));
    assert!(files.contains(&format!("{}::docs/readme.md", archive.display())));
    assert_eq!(matches.len(), 3);
    assert_eq!(stats.archives_searched, 1);
    assert_eq!(stats.files_in_archives_searched, 2);
    assert_eq!(stats.errors, 0);
    assert!(!scratch.exists());
}

#[test]
fn tar_gz_and_gz_are_searched() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    fs::create_dir(&data).unwrap();

    write_raw_tar_gz(&data.join("logs.tar.gz"), &[("app.log", b"boot ok\nneedle found\n")]);

    let mut gz = GzEncoder::new(File::create(data.join("notes.txt.gz")).unwrap(), Compression::default());
    gz.write_all(b"a needle in a gz").unwrap();
    gz.finish().unwrap();

    let scratch = tmp.path().join("scratch");
    let (matches, stats) = searcher(&scratch).search_archives(&data, &pattern("needle"));

    let mut files: Vec<_> = matches.iter().map(|m| m.file_path.clone()).collect();
    files.sort();
    assert_eq!(
        files,
        vec![
            format!("{}::app.log", data.join("logs.tar.gz").display()),
            format!("{}::notes.txt", data.join("notes.txt.gz").display()),
        ]
    );
    assert_eq!(stats.archives_searched, 2);
}

#[test]
fn too_many_zip_entries_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    fs::create_dir(&data).unwrap();
    let entries: Vec<_> = (0..=MAX_ENTRIES)
        .map(|i| (format!("f{i}.txt"), b"needle".to_vec()))
        .collect();
    let archive = data.join("many.zip");
    write_zip(&archive, &entries);

    let dest = tmp.path().join("out");
    assert!(!ArchiveExtractor::new(&options()).extract(&archive, &dest));

    let scratch = tmp.path().join("scratch");
    let (matches, stats) = searcher(&scratch).search_archives(&data, &pattern("needle"));
    assert!(matches.is_empty());
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.archives_skipped, 1);
    assert!(!scratch.exists());
}

#[test]
fn tar_with_parent_traversal_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let archive = tmp.path().join("evil.tar.gz");
    write_raw_tar_gz(&archive, &[("ok.txt", b"fine"), ("../escape.txt", b"needle")]);

    let dest = tmp.path().join("out");
    assert!(!ArchiveExtractor::new(&options()).extract(&archive, &dest));
    assert!(!tmp.path().join("escape.txt").exists());
    assert!(!dest.join("ok.txt").exists());
}

#[test]
fn tar_with_absolute_path_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    fs::create_dir(&data).unwrap();
    write_raw_tar_gz(&data.join("abs.tgz"), &[("/tmp/fileder-abs-entry.txt", b"needle")]);

    let scratch = tmp.path().join("scratch");
    let (matches, stats) = searcher(&scratch).search_archives(&data, &pattern("needle"));
    assert!(matches.is_empty());
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.archives_skipped, 1);
    assert!(!scratch.exists());
}

#[test]
fn corrupt_archive_is_a_clean_failure() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("broken.zip"), b"PK\x03\x04 but nothing else").unwrap();
    fs::write(data.join("plain.gz"), b"not gzip at all").unwrap();

    let scratch = tmp.path().join("scratch");
    let (matches, stats) = searcher(&scratch).search_archives(&data, &pattern("x"));
    assert!(matches.is_empty());
    assert_eq!(stats.archives_searched, 2);
    assert_eq!(stats.errors, 2);
}

#[test]
fn oversized_archives_are_not_extracted() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    fs::create_dir(&data).unwrap();
    write_zip(&data.join("big.zip"), &[("a.txt".to_string(), vec![b'x'; 4096])]);

    let opts = SearchOptions {
        max_file_size_bytes: 10,
        ..options()
    };
    let scratch = tmp.path().join("scratch");
    let (matches, stats) = ArchiveSearcher::new(SearchContext::new(opts))
        .with_scratch_root(&scratch)
        .search_archives(&data, &pattern("x"));
    assert!(matches.is_empty());
    assert_eq!(stats.archives_searched, 0);
    assert_eq!(stats.archives_skipped, 1);
}

#[test]
fn excluded_paths_do_not_hide_extracted_contents() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    fs::create_dir(&data).unwrap();
    let archive = data.join("bundle.zip");
    write_zip(&archive, &[("inner.txt".to_string(), b"the needle".to_vec())]);

    let system = tmp.path().join("system");
    let opts = options().with_excluded_paths([system.to_string_lossy()]);
    let scratch = system.join("scratch");
    let (matches, stats) = ArchiveSearcher::new(SearchContext::new(opts))
        .with_scratch_root(&scratch)
        .search_archives(&data, &pattern("needle"));

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].file_path, format!("{}::inner.txt", archive.display()));
    assert_eq!(stats.files_in_archives_searched, 1);
    assert!(!scratch.exists());
}

#[test]
fn archives_under_excluded_paths_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    let vendor = data.join("vendor");
    fs::create_dir_all(&vendor).unwrap();
    write_zip(&vendor.join("deps.zip"), &[("lib.txt".to_string(), b"needle".to_vec())]);

    let opts = options().with_excluded_paths([vendor.to_string_lossy()]);
    let (matches, stats) = ArchiveSearcher::new(SearchContext::new(opts))
        .with_scratch_root(tmp.path().join("scratch"))
        .search_archives(&data, &pattern("needle"));

    assert!(matches.is_empty());
    assert_eq!(stats.archives_searched, 0);
    assert_eq!(stats.archives_skipped, 1);
}
