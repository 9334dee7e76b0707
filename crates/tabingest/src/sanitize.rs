//! Helpers for sanitizing file names before they touch the filesystem or
//! tracing span attributes.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Reduces an uploaded filename to a single safe path component.
///
/// Directory parts (either separator style) are stripped, control characters
/// removed, and names that end up empty or dots-only are rejected.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == ':' { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim().to_string();

    if cleaned.trim_matches('.').is_empty() {
        return None;
    }
    Some(cleaned)
}

/// Short, filesystem-friendly prefix derived from a filename, used to name
/// per-run working directories.
pub fn dir_prefix(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    let mut prefix: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(32)
        .collect();
    if prefix.is_empty() {
        prefix.push_str("upload");
    }
    prefix.push_str("_proc_");
    prefix
}
