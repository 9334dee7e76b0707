//! Best-effort tabular parsing.
//!
//! A [`TableParser`] holds an ordered list of [`ParseTemplate`]s and tries
//! them in order. The first template that decodes the file and yields an
//! acceptable header wins; later templates are never consulted, even if
//! they would produce a "better" result.

use std::borrow::Cow;
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use serde::Serialize;
use tracing::{debug, info};

use crate::classify::{self, ClassificationResult};
use crate::config::ParseTemplate;
use crate::error::ParseError;
use crate::sanitize;

/// Extension-derived MIME types that mark a file as a tabular candidate.
const TABULAR_MIMES: &[&str] = &["text/csv", "text/plain", "text/tab-separated-values"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseResult {
    pub template_used: String,
    /// Empty when the winning template does not read a header.
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
}

pub struct TableParser {
    templates: Vec<ParseTemplate>,
}

impl TableParser {
    pub fn new(templates: Vec<ParseTemplate>) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &[ParseTemplate] {
        &self.templates
    }

    /// True when either the extension or the content says "text".
    pub fn is_table_candidate(path: &Path, classification: &ClassificationResult) -> bool {
        let by_extension = mime_guess::from_path(path)
            .first_raw()
            .map(|mime| TABULAR_MIMES.contains(&mime))
            .unwrap_or(false);
        by_extension || classification.is_text()
    }

    /// Classifies `path`, rejects non-tabular content, then parses it.
    pub fn parse_candidate(&self, path: &Path) -> Result<ParseResult, ParseError> {
        let classification = classify::classify(path);
        if !Self::is_table_candidate(path, &classification) {
            return Err(ParseError::NotTabular(path.to_path_buf()));
        }
        self.parse(path)
    }

    pub fn parse(&self, path: &Path) -> Result<ParseResult, ParseError> {
        let bytes = std::fs::read(path).map_err(|e| ParseError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut attempts = Vec::with_capacity(self.templates.len());
        for template in &self.templates {
            match try_template(&bytes, template) {
                Ok(result) => {
                    info!(
                        "Parsed {} with template '{}': {} row(s)",
                        sanitize::redact_path(path),
                        template.name,
                        result.row_count
                    );
                    return Ok(result);
                }
                Err(reason) => {
                    debug!("Template '{}' rejected: {}", template.name, reason);
                    attempts.push(format!("{}: {}", template.name, reason));
                }
            }
        }

        Err(ParseError::TemplatesExhausted {
            path: path.to_path_buf(),
            attempts,
        })
    }
}

/// Applies one template to the raw bytes; the error is a short reason.
fn try_template(bytes: &[u8], template: &ParseTemplate) -> Result<ParseResult, String> {
    let text = decode(bytes, &template.encoding)?;
    let body = skip_lines(&text, template.skip_lines);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(template.delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| format!("malformed record: {}", e))?;
        let cells: Vec<String> = record.iter().map(str::to_string).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        if template.header_required && header.is_none() {
            header = Some(cells);
        } else {
            rows.push(cells);
        }
    }

    let header = match header {
        Some(h) => {
            if h.len() < template.min_columns {
                return Err(format!(
                    "header has {} field(s), need {}",
                    h.len(),
                    template.min_columns
                ));
            }
            h
        }
        None if template.header_required => return Err("no header line".to_string()),
        None => {
            if let Some(first) = rows.first() {
                if first.len() < template.min_columns {
                    return Err(format!(
                        "first row has {} field(s), need {}",
                        first.len(),
                        template.min_columns
                    ));
                }
            }
            Vec::new()
        }
    };

    Ok(ParseResult {
        template_used: template.name.clone(),
        header,
        row_count: rows.len(),
        rows,
    })
}

fn decode<'a>(bytes: &'a [u8], label: &str) -> Result<Cow<'a, str>, String> {
    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| format!("unknown encoding '{}'", label))?;
    let bytes = if encoding == UTF_8 {
        bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
    } else {
        bytes
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| format!("not valid {}", encoding.name()))
}

fn skip_lines(text: &str, count: usize) -> &str {
    let mut rest = text;
    for _ in 0..count {
        match rest.find('\n') {
            Some(idx) => rest = &rest[idx + 1..],
            None => return "",
        }
    }
    rest
}
