//! Byte-signature sniffing.
//!
//! Only the leading bytes of a file are inspected. The archive formats the
//! extractor dispatches on are checked first, in a fixed order, so that
//! zip-based containers (office documents, jars) still dispatch as zip. Any
//! other signature `infer` knows comes next; content without a signature
//! falls through to a text heuristic and finally to
//! `application/octet-stream`.

use infer::MatcherType;

/// Number of leading bytes read for sniffing.
pub const PREFIX_LEN: usize = 8192;

pub const MIME_EMPTY: &str = "inode/x-empty";
pub const MIME_CSV: &str = "text/csv";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_BINARY: &str = "application/octet-stream";
pub const MIME_TAR: &str = "application/x-tar";

type Matcher = fn(&[u8]) -> bool;

const ARCHIVES: &[(Matcher, &str)] = &[
    (infer::archive::is_zip, "application/zip"),
    (infer::archive::is_gz, "application/gzip"),
    (infer::archive::is_bz2, "application/x-bzip2"),
    (infer::archive::is_7z, "application/x-7z-compressed"),
    (infer::archive::is_rar, "application/vnd.rar"),
    (infer::archive::is_tar, MIME_TAR),
];

const DELIMITERS: &[u8] = b",;\t|";

/// Returns the MIME type for the given file prefix.
///
/// `truncated` is true when the file is longer than `prefix`, in which case
/// the last (possibly partial) line is ignored by the delimiter check.
pub fn sniff(prefix: &[u8], truncated: bool) -> &'static str {
    if prefix.is_empty() {
        return MIME_EMPTY;
    }

    if let Some((_, mime)) = ARCHIVES.iter().find(|(matches, _)| matches(prefix)) {
        return mime;
    }
    // Text kinds (html, xml, scripts) go through the heuristic below.
    if let Some(kind) = infer::get(prefix).filter(|k| k.matcher_type() != MatcherType::Text) {
        return kind.mime_type();
    }

    if looks_like_text(prefix) {
        if looks_delimited(prefix, truncated) {
            MIME_CSV
        } else {
            MIME_TEXT
        }
    } else {
        MIME_BINARY
    }
}

/// True when `bytes` carries a POSIX/GNU tar header.
pub fn is_tar(bytes: &[u8]) -> bool {
    infer::archive::is_tar(bytes)
}

/// No NUL bytes and at most 5% control bytes other than common whitespace.
/// Bytes >= 0x80 count as text so legacy multi-byte encodings pass.
fn looks_like_text(data: &[u8]) -> bool {
    if data.contains(&0) {
        return false;
    }
    let control = data
        .iter()
        .filter(|&&b| (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b)) || b == 0x7f)
        .count();
    control * 20 <= data.len()
}

/// A delimiter occurs the same non-zero number of times on each of the
/// first few non-empty lines.
fn looks_delimited(data: &[u8], truncated: bool) -> bool {
    let mut lines: Vec<&[u8]> = data
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .collect();
    if truncated && lines.len() > 1 {
        lines.pop();
    }
    let sample: Vec<&[u8]> = lines
        .into_iter()
        .filter(|line| line.iter().any(|b| !b.is_ascii_whitespace()))
        .take(5)
        .collect();
    if sample.is_empty() {
        return false;
    }

    DELIMITERS.iter().any(|&delim| {
        let first = count(sample[0], delim);
        first > 0 && sample.iter().all(|line| count(line, delim) == first)
    })
}

fn count(line: &[u8], delim: u8) -> usize {
    line.iter().filter(|&&b| b == delim).count()
}
