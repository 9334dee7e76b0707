//! Archive extraction into a per-run working directory.
//!
//! Dispatch is an exhaustive match over [`ContentCategory`]; adding a
//! category forces a decision here. Every entry name is passed through
//! [`guard::confine`] before anything is written, and entries that would
//! land outside the working directory are dropped and reported.

mod compressed;
mod external;
pub mod guard;
mod tarball;
mod zipfile;

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::classify::ContentCategory;
use crate::error::ExtractionError;
use crate::sanitize;

pub use compressed::Compression;
pub use external::ExternalTool;

/// Result of one extraction attempt.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionOutcome {
    /// Regular files produced, all inside the working directory.
    pub extracted_files: Vec<PathBuf>,
    pub succeeded: bool,
    pub diagnostic: String,
    /// Entries skipped because their path escaped the working directory or
    /// they were links.
    pub dropped_entries: Vec<String>,
    /// Content is recognized but unprocessable; not a failure.
    pub terminal: bool,
}

impl ExtractionOutcome {
    fn from_unpacked(unpacked: Unpacked, category: ContentCategory) -> Self {
        let diagnostic = if unpacked.dropped.is_empty() {
            format!(
                "Extracted {} file(s) from {} content",
                unpacked.files.len(),
                category
            )
        } else {
            format!(
                "Extracted {} file(s) from {} content; dropped {} unsafe entr{}",
                unpacked.files.len(),
                category,
                unpacked.dropped.len(),
                if unpacked.dropped.len() == 1 { "y" } else { "ies" }
            )
        };
        Self {
            extracted_files: unpacked.files,
            succeeded: true,
            diagnostic,
            dropped_entries: unpacked.dropped,
            terminal: false,
        }
    }

    fn failed(err: ExtractionError) -> Self {
        Self {
            diagnostic: err.to_string(),
            ..Default::default()
        }
    }

    fn unsupported() -> Self {
        Self {
            succeeded: true,
            terminal: true,
            diagnostic: "Content type is recognized; no further processing applicable".to_string(),
            ..Default::default()
        }
    }

    pub fn has_dropped_entries(&self) -> bool {
        !self.dropped_entries.is_empty()
    }
}

/// Files written by a backend plus entries it refused.
#[derive(Debug, Default)]
pub(crate) struct Unpacked {
    pub files: Vec<PathBuf>,
    pub dropped: Vec<String>,
}

impl Unpacked {
    pub fn add_file(&mut self, path: PathBuf) {
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }

    pub fn drop_entry(&mut self, name: &str, reason: &str) {
        warn!("Dropping archive entry '{}': {}", name, reason);
        self.dropped.push(format!("{} ({})", name, reason));
    }
}

/// Extracts `path` into `working_dir` according to `category`.
///
/// Never returns an error; failures are reported through the outcome.
pub fn extract(path: &Path, category: ContentCategory, working_dir: &Path) -> ExtractionOutcome {
    let _span = tracing::info_span!(
        "extract",
        file = %sanitize::redact_path(path),
        category = %category,
    )
    .entered();

    if let Err(e) = std::fs::create_dir_all(working_dir) {
        return ExtractionOutcome::failed(ExtractionError::CreateDirectory {
            path: working_dir.to_path_buf(),
            source: e,
        });
    }

    let result = match category {
        ContentCategory::PlainText => copy_plain(path, working_dir),
        ContentCategory::Zip => zipfile::extract_zip(path, working_dir),
        ContentCategory::Tar => open_archive(path).and_then(|file| {
            let mut unpacked = Unpacked::default();
            tarball::extract_tar(file, working_dir, &mut unpacked)?;
            Ok(unpacked)
        }),
        ContentCategory::Gzip => compressed::extract(path, Compression::Gzip, working_dir),
        ContentCategory::Bzip2 => compressed::extract(path, Compression::Bzip2, working_dir),
        ContentCategory::SevenZip => external::extract(ExternalTool::SevenZip, path, working_dir),
        ContentCategory::Rar => external::extract(ExternalTool::Rar, path, working_dir),
        ContentCategory::Unsupported => return ExtractionOutcome::unsupported(),
        ContentCategory::Unknown => Err(ExtractionError::UnknownContent),
    };

    match result {
        Ok(unpacked) => {
            debug!(
                "Extraction produced {} file(s), dropped {}",
                unpacked.files.len(),
                unpacked.dropped.len()
            );
            ExtractionOutcome::from_unpacked(unpacked, category)
        }
        Err(e) => {
            warn!("Extraction failed: {}", e);
            ExtractionOutcome::failed(e)
        }
    }
}

pub(crate) fn open_archive(path: &Path) -> Result<File, ExtractionError> {
    File::open(path).map_err(|e| ExtractionError::ReadArchive {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Creates parent directories and copies `reader` into `target`.
pub(crate) fn write_entry<R: std::io::Read>(
    reader: &mut R,
    target: &Path,
) -> Result<(), ExtractionError> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ExtractionError::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let write_err = |e| ExtractionError::WriteFile {
        path: target.to_path_buf(),
        source: e,
    };
    let mut out = File::create(target).map_err(write_err)?;
    std::io::copy(reader, &mut out).map_err(write_err)?;
    Ok(())
}

fn copy_plain(path: &Path, working_dir: &Path) -> Result<Unpacked, ExtractionError> {
    let name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "upload.txt".into());
    let target = working_dir.join(name);
    std::fs::copy(path, &target).map_err(|e| ExtractionError::WriteFile {
        path: target.clone(),
        source: e,
    })?;

    let mut unpacked = Unpacked::default();
    unpacked.add_file(target);
    Ok(unpacked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            for (name, data) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_plain_text_is_copied() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let path = src.path().join("data.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let outcome = extract(&path, ContentCategory::PlainText, work.path());
        assert!(outcome.succeeded);
        assert!(!outcome.terminal);
        assert_eq!(outcome.extracted_files, vec![work.path().join("data.csv")]);
        assert!(path.exists());
    }

    #[test]
    fn test_zip_extracts_nested_files() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let path = src.path().join("batch.zip");
        std::fs::write(
            &path,
            zip_with(&[("x.csv", b"a,b\n1,2\n"), ("sub/y.csv", b"c,d\n3,4\n")]),
        )
        .unwrap();

        let outcome = extract(&path, ContentCategory::Zip, work.path());
        assert!(outcome.succeeded, "{}", outcome.diagnostic);
        assert_eq!(outcome.extracted_files.len(), 2);
        assert!(work.path().join("sub/y.csv").exists());
        for file in &outcome.extracted_files {
            assert!(file.starts_with(work.path()));
        }
    }

    #[test]
    fn test_zip_traversal_entry_dropped() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let inner = work.path().join("inner");
        let path = src.path().join("evil.zip");
        std::fs::write(
            &path,
            zip_with(&[("../../evil.csv", b"a,b\n1,2\n"), ("ok.csv", b"a,b\n1,2\n")]),
        )
        .unwrap();

        let outcome = extract(&path, ContentCategory::Zip, &inner);
        assert!(outcome.succeeded);
        assert_eq!(outcome.extracted_files, vec![inner.join("ok.csv")]);
        assert_eq!(outcome.dropped_entries.len(), 1);
        assert!(outcome.dropped_entries[0].contains("evil.csv"));
        assert!(!work.path().join("evil.csv").exists());
        assert!(!src.path().join("evil.csv").exists());
    }

    #[test]
    fn test_zip_hidden_entries_skipped() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let path = src.path().join("mac.zip");
        std::fs::write(
            &path,
            zip_with(&[
                ("data.csv", b"a,b\n1,2\n"),
                ("__MACOSX/._data.csv", b"\x00\x05"),
                (".DS_Store", b"\x00"),
            ]),
        )
        .unwrap();

        let outcome = extract(&path, ContentCategory::Zip, work.path());
        assert_eq!(outcome.extracted_files, vec![work.path().join("data.csv")]);
        assert!(outcome.dropped_entries.is_empty());
    }

    #[test]
    fn test_corrupt_zip_fails() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let path = src.path().join("broken.zip");
        std::fs::write(&path, b"PK\x03\x04garbage").unwrap();

        let outcome = extract(&path, ContentCategory::Zip, work.path());
        assert!(!outcome.succeeded);
        assert!(outcome.extracted_files.is_empty());
        assert!(outcome.diagnostic.contains("zip"));
    }

    #[test]
    fn test_unsupported_is_terminal() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let path = src.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let outcome = extract(&path, ContentCategory::Unsupported, work.path());
        assert!(outcome.succeeded);
        assert!(outcome.terminal);
        assert!(outcome.extracted_files.is_empty());
        assert!(outcome
            .diagnostic
            .contains("no further processing applicable"));
    }

    #[test]
    fn test_unknown_fails() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let path = src.path().join("mystery");
        std::fs::write(&path, b"\x00\x01").unwrap();

        let outcome = extract(&path, ContentCategory::Unknown, work.path());
        assert!(!outcome.succeeded);
        assert!(!outcome.terminal);
    }
}
