use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base directory that relative directory names resolve against.
    /// Falls back to the platform data directory when unset.
    #[serde(default)]
    pub root_directory: Option<String>,
    #[serde(default = "default_database_name")]
    pub database_name: String,
    #[serde(default = "default_upload_dir_name")]
    pub upload_dir_name: String,
    #[serde(default = "default_extraction_dir_name")]
    pub extraction_dir_name: String,
    /// MIME type -> category name (`plain_text`, `zip`, `gzip`, `tar`,
    /// `bzip2`, `seven_zip`, `rar`, `unsupported`).
    #[serde(default = "default_mime_categories")]
    pub mime_categories: BTreeMap<String, String>,
    /// Tried in order, first match wins.
    #[serde(default = "default_templates")]
    pub templates: Vec<ParseTemplate>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_directory: None,
            database_name: default_database_name(),
            upload_dir_name: default_upload_dir_name(),
            extraction_dir_name: default_extraction_dir_name(),
            mime_categories: default_mime_categories(),
            templates: default_templates(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Returns the effective root directory.
    pub fn root(&self) -> PathBuf {
        match &self.root_directory {
            Some(root) => PathBuf::from(root),
            None => default_root_directory(),
        }
    }
}

/// `<data dir>/tabingest`, or the working directory if the platform has none.
pub fn default_root_directory() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tabingest"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_database_name() -> String {
    "ingest_data.sqlite".to_string()
}

fn default_upload_dir_name() -> String {
    "temp_uploads".to_string()
}

fn default_extraction_dir_name() -> String {
    "temp_extracted".to_string()
}

fn default_mime_categories() -> BTreeMap<String, String> {
    let pairs: &[(&str, &str)] = &[
        // Archives
        ("application/zip", "zip"),
        ("application/x-zip-compressed", "zip"),
        ("application/x-rar-compressed", "rar"),
        ("application/x-rar", "rar"),
        ("application/vnd.rar", "rar"),
        ("application/x-7z-compressed", "seven_zip"),
        ("application/gzip", "gzip"),
        ("application/x-gzip", "gzip"),
        ("application/x-tar", "tar"),
        ("application/x-bzip2", "bzip2"),
        // Text
        ("text/plain", "plain_text"),
        ("text/csv", "plain_text"),
        ("application/x-empty", "plain_text"),
        ("inode/x-empty", "plain_text"),
        // Recognized, nothing to do
        ("application/octet-stream", "unsupported"),
        ("application/pdf", "unsupported"),
        ("application/x-xz", "unsupported"),
        ("application/x-executable", "unsupported"),
        ("application/x-ole-storage", "unsupported"),
        ("application/vnd.sqlite3", "unsupported"),
        ("application/msword", "unsupported"),
        ("application/vnd.ms-excel", "unsupported"),
        ("application/vnd.ms-powerpoint", "unsupported"),
        ("application/x-msdownload", "unsupported"),
        ("application/vnd.microsoft.portable-executable", "unsupported"),
        ("application/x-mach-binary", "unsupported"),
        ("application/wasm", "unsupported"),
        ("application/x-compress", "unsupported"),
        ("application/zstd", "unsupported"),
        ("application/x-lzip", "unsupported"),
        ("application/x-lz4", "unsupported"),
        ("application/rtf", "unsupported"),
        ("image/png", "unsupported"),
        ("image/jpeg", "unsupported"),
        ("image/gif", "unsupported"),
        ("image/webp", "unsupported"),
        ("image/bmp", "unsupported"),
        ("image/tiff", "unsupported"),
        ("image/x-icon", "unsupported"),
        ("image/heif", "unsupported"),
        ("image/avif", "unsupported"),
    ];
    pairs
        .iter()
        .map(|(mime, category)| (mime.to_string(), category.to_string()))
        .collect()
}

/// A fixed combination of delimiter, encoding, leading-line skip and header
/// requirement used to attempt parsing a candidate file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseTemplate {
    pub name: String,
    pub delimiter: char,
    /// Any WHATWG encoding label understood by `encoding_rs`.
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default)]
    pub skip_lines: usize,
    #[serde(default = "default_true")]
    pub header_required: bool,
    /// Minimum number of header fields for the template to count as a match.
    #[serde(default = "default_min_columns")]
    pub min_columns: usize,
}

impl ParseTemplate {
    pub fn new(name: &str, delimiter: char, encoding: &str) -> Self {
        Self {
            name: name.to_string(),
            delimiter,
            encoding: encoding.to_string(),
            skip_lines: 0,
            header_required: true,
            min_columns: default_min_columns(),
        }
    }

    pub fn skipping(mut self, lines: usize) -> Self {
        self.skip_lines = lines;
        self
    }

    pub fn min_columns(mut self, columns: usize) -> Self {
        self.min_columns = columns;
        self
    }

    pub fn without_header(mut self) -> Self {
        self.header_required = false;
        self
    }
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_true() -> bool {
    true
}

fn default_min_columns() -> usize {
    2
}

pub fn default_templates() -> Vec<ParseTemplate> {
    vec![
        ParseTemplate::new("utf8-comma", ',', "utf-8"),
        ParseTemplate::new("utf8-semicolon", ';', "utf-8"),
        ParseTemplate::new("utf8-tab", '\t', "utf-8"),
        ParseTemplate::new("utf8-pipe", '|', "utf-8"),
        ParseTemplate::new("big5-comma", ',', "big5"),
        ParseTemplate::new("utf8-comma-titled", ',', "utf-8").skipping(1),
        ParseTemplate::new("utf8-single-column", ',', "utf-8").min_columns(1),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
