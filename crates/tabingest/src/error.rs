use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TabingestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Classification error: {0}")]
    Classify(#[from] ClassifyError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid template '{name}': {reason}")]
    InvalidTemplate { name: String, reason: String },

    #[error("MIME type '{mime}' maps to unknown category '{category}'")]
    UnknownCategory { mime: String, category: String },
}

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("File '{path}' does not exist")]
    NotFound { path: PathBuf },

    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Content type is not recognized, nothing can be extracted")]
    UnknownContent,

    #[error("Failed to read archive '{path}': {source}")]
    ReadArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {format} archive: {reason}")]
    Malformed { format: &'static str, reason: String },

    #[error("External tool '{tool}' failed: {reason}")]
    ToolFailed { tool: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("'{0}' does not look like tabular text")]
    NotTabular(PathBuf),

    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No parsing template matched '{}' (tried: {})", path.display(), attempts.join(", "))]
    TemplatesExhausted {
        path: PathBuf,
        attempts: Vec<String>,
    },
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid upload filename: '{0}'")]
    InvalidName(String),

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write upload '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TabingestError>;
