//! Content-type classification from file bytes.
//!
//! The classifier never looks at the filename. Its output is a MIME string;
//! turning that into a dispatchable [`ContentCategory`] is the job of the
//! configured [`CategoryMap`].

pub mod magic;

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ClassifyError, ConfigError};
use crate::sanitize;

/// Sentinel MIME type for files whose content could not be read.
pub const UNKNOWN_MIME: &str = "application/x-unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub mime_type: String,
    pub size_bytes: u64,
    /// Set when the sentinel was returned because of an I/O problem.
    pub diagnostic: Option<String>,
}

impl ClassificationResult {
    fn detected(mime_type: &str, size_bytes: u64) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            size_bytes,
            diagnostic: None,
        }
    }

    fn unknown(size_bytes: u64, diagnostic: String) -> Self {
        Self {
            mime_type: UNKNOWN_MIME.to_string(),
            size_bytes,
            diagnostic: Some(diagnostic),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.mime_type == UNKNOWN_MIME
    }

    pub fn is_text(&self) -> bool {
        self.mime_type.starts_with("text/") || self.mime_type == magic::MIME_EMPTY
    }
}

/// Dispatch category for a classified file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    PlainText,
    Zip,
    Gzip,
    Tar,
    Bzip2,
    SevenZip,
    Rar,
    /// Recognized, but nothing downstream can use it.
    Unsupported,
    Unknown,
}

impl ContentCategory {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "plain_text" => Some(Self::PlainText),
            "zip" => Some(Self::Zip),
            "gzip" => Some(Self::Gzip),
            "tar" => Some(Self::Tar),
            "bzip2" => Some(Self::Bzip2),
            "seven_zip" => Some(Self::SevenZip),
            "rar" => Some(Self::Rar),
            "unsupported" => Some(Self::Unsupported),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PlainText => "plain_text",
            Self::Zip => "zip",
            Self::Gzip => "gzip",
            Self::Tar => "tar",
            Self::Bzip2 => "bzip2",
            Self::SevenZip => "seven_zip",
            Self::Rar => "rar",
            Self::Unsupported => "unsupported",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(
            self,
            Self::Zip | Self::Gzip | Self::Tar | Self::Bzip2 | Self::SevenZip | Self::Rar
        )
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// MIME type -> category lookup built from configuration.
#[derive(Debug, Clone)]
pub struct CategoryMap {
    entries: BTreeMap<String, ContentCategory>,
}

impl CategoryMap {
    pub fn from_config(map: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut entries = BTreeMap::new();
        for (mime, name) in map {
            let category =
                ContentCategory::from_name(name).ok_or_else(|| ConfigError::UnknownCategory {
                    mime: mime.clone(),
                    category: name.clone(),
                })?;
            entries.insert(mime.to_ascii_lowercase(), category);
        }
        Ok(Self { entries })
    }

    /// Unmapped MIME types and the unreadable sentinel resolve to `Unknown`.
    pub fn resolve(&self, classification: &ClassificationResult) -> ContentCategory {
        if classification.is_unknown() {
            return ContentCategory::Unknown;
        }
        self.entries
            .get(&classification.mime_type.to_ascii_lowercase())
            .copied()
            .unwrap_or(ContentCategory::Unknown)
    }
}

/// Classifies `path` by its leading bytes.
///
/// Never fails: unreadable files yield the [`UNKNOWN_MIME`] sentinel with a
/// diagnostic.
pub fn classify(path: &Path) -> ClassificationResult {
    match read_prefix(path) {
        Ok((prefix, size)) => {
            let truncated = (prefix.len() as u64) < size;
            let mime = magic::sniff(&prefix, truncated);
            debug!(
                "Classified {} as {} ({} bytes)",
                sanitize::redact_path(path),
                mime,
                size
            );
            ClassificationResult::detected(mime, size)
        }
        Err(e) => {
            warn!("Cannot classify {}: {}", sanitize::redact_path(path), e);
            let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            ClassificationResult::unknown(size, e.to_string())
        }
    }
}

fn read_prefix(path: &Path) -> Result<(Vec<u8>, u64), ClassifyError> {
    if !path.exists() {
        return Err(ClassifyError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let read_err = |e| ClassifyError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    };

    let file = File::open(path).map_err(read_err)?;
    let size = file.metadata().map_err(read_err)?.len();
    let mut prefix = Vec::with_capacity(magic::PREFIX_LEN);
    file.take(magic::PREFIX_LEN as u64)
        .read_to_end(&mut prefix)
        .map_err(read_err)?;
    Ok((prefix, size))
}
