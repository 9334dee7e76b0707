//! Staging of uploaded `(filename, bytes)` pairs into the upload directory.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::UploadError;
use crate::sanitize;

/// Writes one upload under its sanitized name and returns the staged path.
///
/// A name that collides with an existing file gets `_1`, `_2`, ... inserted
/// before the extension.
pub fn stage_upload(
    name: &str,
    bytes: &[u8],
    upload_dir: &Path,
) -> Result<PathBuf, UploadError> {
    let clean = sanitize::sanitize_filename(name)
        .ok_or_else(|| UploadError::InvalidName(name.to_string()))?;
    std::fs::create_dir_all(upload_dir).map_err(|e| UploadError::CreateDirectory {
        path: upload_dir.to_path_buf(),
        source: e,
    })?;

    let target = unique_path(upload_dir, &clean);
    if let Err(e) = std::fs::write(&target, bytes) {
        // Do not leave a truncated file behind.
        let _ = std::fs::remove_file(&target);
        return Err(UploadError::WriteFile {
            path: target,
            source: e,
        });
    }
    info!(
        "Staged upload {} ({} bytes)",
        sanitize::redact_path(&target),
        bytes.len()
    );
    Ok(target)
}

/// Stages every upload, in input order. All or nothing: on the first
/// failure the uploads already staged by this call are removed.
pub fn stage_uploads(
    uploads: &[(String, Vec<u8>)],
    upload_dir: &Path,
) -> Result<Vec<PathBuf>, UploadError> {
    let mut staged = Vec::with_capacity(uploads.len());
    for (name, bytes) in uploads {
        match stage_upload(name, bytes, upload_dir) {
            Ok(path) => staged.push(path),
            Err(e) => {
                remove_staged(&staged);
                return Err(e);
            }
        }
    }
    Ok(staged)
}

/// Removes staged files, logging the ones that cannot be removed.
pub fn remove_staged(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(
                "Could not remove staged upload {}: {}",
                sanitize::redact_path(path),
                e
            );
        }
    }
}

fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, n, ext));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
