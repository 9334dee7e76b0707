//! Single-stream compressors (gzip, bzip2), optionally wrapping a tar.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use tracing::debug;

use super::{open_archive, tarball, write_entry, Unpacked};
use crate::classify::magic;
use crate::error::ExtractionError;

const STAGING_NAME: &str = ".decompressed.partial";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
}

impl Compression {
    fn format(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
        }
    }

    fn decoder(self, file: File) -> Box<dyn Read> {
        match self {
            Self::Gzip => Box::new(MultiGzDecoder::new(file)),
            Self::Bzip2 => Box::new(MultiBzDecoder::new(file)),
        }
    }

    /// Name of the decompressed payload: known suffix stripped, tarball
    /// shorthands expanded.
    pub fn output_name(self, source_name: &str) -> String {
        let lower = source_name.to_ascii_lowercase();
        let rules: &[(&str, &str)] = match self {
            Self::Gzip => &[(".tgz", ".tar"), (".gz", ""), (".gzip", "")],
            Self::Bzip2 => &[(".tbz2", ".tar"), (".tbz", ".tar"), (".bz2", ""), (".bz", "")],
        };
        for (suffix, replacement) in rules {
            if lower.ends_with(suffix) && lower.len() > suffix.len() {
                let stem = &source_name[..source_name.len() - suffix.len()];
                return format!("{}{}", stem, replacement);
            }
        }
        source_name.to_string()
    }
}

/// Decompresses into a staging file, then either unpacks it as tar or
/// renames it to the derived output name.
pub(super) fn extract(
    path: &Path,
    compression: Compression,
    dest: &Path,
) -> Result<Unpacked, ExtractionError> {
    let file = open_archive(path)?;
    let staging = dest.join(STAGING_NAME);

    let mut decoder = compression.decoder(file);
    if let Err(e) = write_entry(&mut decoder, &staging) {
        remove_staging(&staging);
        // Decoder errors surface as write failures; report them as corrupt input.
        return Err(match e {
            ExtractionError::WriteFile { source, .. } if is_decode_error(&source) => {
                ExtractionError::Malformed {
                    format: compression.format(),
                    reason: source.to_string(),
                }
            }
            other => other,
        });
    }

    let mut unpacked = Unpacked::default();
    if staged_is_tar(&staging)? {
        debug!("{} stream wraps a tar archive", compression.format());
        let inner = open_archive(&staging)?;
        let result = tarball::extract_tar(inner, dest, &mut unpacked);
        remove_staging(&staging);
        result?;
        return Ok(unpacked);
    }

    let source_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("decompressed");
    let target = dest.join(compression.output_name(source_name));
    std::fs::rename(&staging, &target).map_err(|e| ExtractionError::WriteFile {
        path: target.clone(),
        source: e,
    })?;
    unpacked.add_file(target);
    Ok(unpacked)
}

fn is_decode_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
    )
}

fn staged_is_tar(staging: &Path) -> Result<bool, ExtractionError> {
    let file = open_archive(staging)?;
    let mut header = Vec::with_capacity(512);
    file.take(512)
        .read_to_end(&mut header)
        .map_err(|e| ExtractionError::ReadArchive {
            path: staging.to_path_buf(),
            source: e,
        })?;
    Ok(magic::is_tar(&header))
}

fn remove_staging(staging: &Path) {
    if let Err(e) = std::fs::remove_file(staging) {
        debug!("Could not remove staging file: {}", e);
    }
}
