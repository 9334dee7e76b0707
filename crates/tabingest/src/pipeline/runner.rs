use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Map};
use tempfile::TempDir;
use tracing::{debug, info_span, warn};
use uuid::Uuid;

use crate::classify::{self, ContentCategory};
use crate::db::{record_repo, Database, DatabaseError};
use crate::error::{ParseError, UploadError};
use crate::extract::{self, ExtractionOutcome};
use crate::parse::{ParseResult, TableParser};
use crate::sanitize;
use crate::upload;

use super::config::PipelineConfig;
use super::context::{details, RunContext};
use super::report::{
    format_size, BatchOutcome, PipelineRunResult, ReportEvent, ReportSink, StepStatus,
};

const STEP_CLASSIFY: &str = "File type identification";
const STEP_EXTRACT: &str = "Extraction";
const STEP_STAGE: &str = "Upload staging";

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    db: Database,
    parser: TableParser,
    sink: Arc<dyn ReportSink>,
}

impl Pipeline {
    /// Production constructor: opens (and migrates) the record store.
    pub fn from_config(
        config: Arc<PipelineConfig>,
        sink: Arc<dyn ReportSink>,
    ) -> Result<Self, DatabaseError> {
        let db = Database::open(&config.database_path)?;
        Ok(Self::new(config, db, sink))
    }

    /// Uses an already opened store, e.g. one shared with other pipelines.
    pub fn new(config: Arc<PipelineConfig>, db: Database, sink: Arc<dyn ReportSink>) -> Self {
        let parser = TableParser::new(config.templates.clone());
        Self {
            config,
            db,
            parser,
            sink,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Runs the full pipeline for one file. Never fails; every fault is a
    /// step in the returned result.
    pub fn run(&self, path: &Path) -> PipelineRunResult {
        let run_id = Uuid::new_v4().to_string();
        let filename = sanitize::redact_path(path);
        let _pipeline_span = info_span!("pipeline",
            run_id = %run_id,
            filename = %filename,
        )
        .entered();

        let classification = {
            let _step = info_span!("classify").entered();
            classify::classify(path)
        };
        let mut ctx = RunContext::start(
            run_id,
            filename,
            classification.size_bytes,
            self.sink.as_ref(),
        );

        // Step: classify
        let category = self.config.categories.resolve(&classification);
        let mut info = details([
            ("mime_type", json!(classification.mime_type)),
            ("category", json!(category)),
            ("size_bytes", json!(classification.size_bytes)),
            ("size", json!(format_size(classification.size_bytes))),
        ]);
        if let Some(diagnostic) = &classification.diagnostic {
            info.insert("diagnostic".to_string(), json!(diagnostic));
        }
        if category == ContentCategory::Unknown {
            let message = match &classification.diagnostic {
                Some(d) => format!("Cannot read file: {}", d),
                None => format!("Unrecognized content type {}", classification.mime_type),
            };
            ctx.record(STEP_CLASSIFY, StepStatus::Failure, message, info);
            return ctx.finish();
        }
        ctx.record(
            STEP_CLASSIFY,
            StepStatus::Success,
            format!("Detected {} ({})", classification.mime_type, category),
            info,
        );

        // Working directory lives until the end of this function.
        let working_dir = match self.create_working_dir(path) {
            Ok(dir) => dir,
            Err(e) => {
                ctx.record(
                    STEP_EXTRACT,
                    StepStatus::Failure,
                    format!("Cannot create working directory: {}", e),
                    Map::new(),
                );
                return ctx.finish();
            }
        };
        debug!("Run {} working in {}", ctx.run_id(), working_dir.path().display());

        // Step: extract
        let outcome = extract::extract(path, category, working_dir.path());
        let candidates = relative_names(&outcome, working_dir.path());
        if !self.record_extraction(&mut ctx, category, &outcome, &candidates) {
            close_working_dir(working_dir);
            return ctx.finish();
        }

        // Steps: parse and store, per candidate
        for (file, name) in outcome.extracted_files.iter().zip(&candidates) {
            let parsed = {
                let _step = info_span!("parse", file = %name).entered();
                self.parser.parse_candidate(file)
            };
            let Some(result) = record_parse(&mut ctx, name, parsed) else {
                continue;
            };

            let _step = info_span!("store", file = %name).entered();
            let stored = record_repo::insert_rows(
                &self.db,
                name,
                &result.template_used,
                &result.header,
                &result.rows,
            );
            match stored {
                Ok(count) => ctx.record(
                    format!("Store {}", name),
                    StepStatus::Success,
                    format!("Stored {} row(s)", count),
                    details([("file", json!(name)), ("rows_inserted", json!(count))]),
                ),
                Err(e) => ctx.record(
                    format!("Store {}", name),
                    StepStatus::Failure,
                    format!("Database error: {}", e),
                    details([("file", json!(name))]),
                ),
            }
        }

        close_working_dir(working_dir);
        ctx.finish()
    }

    /// Runs every path in order; one failure never stops the others.
    pub fn run_batch(&self, paths: &[PathBuf]) -> BatchOutcome {
        let _batch_span = info_span!("batch", files = paths.len()).entered();
        let runs = paths.iter().map(|p| self.run(p)).collect();
        self.finish_batch(runs)
    }

    /// Stages each upload into the upload directory, runs it and removes the
    /// staged copy. An upload that cannot be staged becomes a failed run of
    /// its own, so every upload yields exactly one result.
    pub fn ingest_uploads(&self, uploads: &[(String, Vec<u8>)]) -> BatchOutcome {
        let _batch_span = info_span!("batch", files = uploads.len()).entered();
        let runs = uploads
            .iter()
            .map(|(name, bytes)| {
                match upload::stage_upload(name, bytes, &self.config.upload_dir) {
                    Ok(staged) => {
                        let result = self.run(&staged);
                        upload::remove_staged(std::slice::from_ref(&staged));
                        result
                    }
                    Err(e) => self.record_staging_failure(name, bytes.len() as u64, e),
                }
            })
            .collect();
        self.finish_batch(runs)
    }

    fn record_staging_failure(
        &self,
        name: &str,
        size_bytes: u64,
        err: UploadError,
    ) -> PipelineRunResult {
        warn!("Upload '{}' not staged: {}", name, err);
        let mut ctx = RunContext::start(
            Uuid::new_v4().to_string(),
            name.to_string(),
            size_bytes,
            self.sink.as_ref(),
        );
        ctx.record(
            STEP_STAGE,
            StepStatus::Failure,
            err.to_string(),
            details([("size_bytes", json!(size_bytes))]),
        );
        ctx.finish()
    }

    fn finish_batch(&self, runs: Vec<PipelineRunResult>) -> BatchOutcome {
        let failed = runs.iter().filter(|r| !r.overall_success).count();
        let status_message = if runs.is_empty() {
            "No files to process".to_string()
        } else if failed == 0 {
            format!("All {} file(s) processed successfully", runs.len())
        } else {
            format!(
                "{} of {} file(s) failed, {} succeeded",
                failed,
                runs.len(),
                runs.len() - failed
            )
        };

        self.sink.report(ReportEvent::BatchFinished {
            status_message: &status_message,
            runs: &runs,
        });

        BatchOutcome {
            status_message,
            overall_success: failed == 0,
            runs,
        }
    }

    fn create_working_dir(&self, path: &Path) -> std::io::Result<TempDir> {
        std::fs::create_dir_all(&self.config.extraction_dir)?;
        tempfile::Builder::new()
            .prefix(&sanitize::dir_prefix(path))
            .tempdir_in(&self.config.extraction_dir)
    }

    /// Records the extraction step; returns whether the run continues.
    fn record_extraction(
        &self,
        ctx: &mut RunContext<'_>,
        category: ContentCategory,
        outcome: &ExtractionOutcome,
        candidates: &[String],
    ) -> bool {
        let mut info = details([
            ("category", json!(category)),
            ("file_count", json!(outcome.extracted_files.len())),
            ("files", json!(candidates)),
        ]);
        if outcome.has_dropped_entries() {
            info.insert("dropped_entries".to_string(), json!(outcome.dropped_entries));
        }

        let status = if !outcome.succeeded {
            StepStatus::Failure
        } else if outcome.terminal {
            StepStatus::Skipped
        } else if outcome.has_dropped_entries() {
            StepStatus::Partial
        } else {
            StepStatus::Success
        };
        ctx.record(STEP_EXTRACT, status, outcome.diagnostic.clone(), info);

        outcome.succeeded && !outcome.terminal
    }
}

/// Records the parse step for one candidate; returns the rows to store.
fn record_parse(
    ctx: &mut RunContext<'_>,
    name: &str,
    parsed: Result<ParseResult, ParseError>,
) -> Option<ParseResult> {
    let step_name = format!("Parse {}", name);
    match parsed {
        Ok(result) => {
            ctx.record(
                step_name,
                StepStatus::Success,
                format!(
                    "Parsed {} row(s) with template '{}'",
                    result.row_count, result.template_used
                ),
                details([
                    ("file", json!(name)),
                    ("template", json!(result.template_used)),
                    ("columns", json!(result.header)),
                    ("row_count", json!(result.row_count)),
                ]),
            );
            Some(result)
        }
        Err(ParseError::NotTabular(_)) => {
            ctx.record(
                step_name,
                StepStatus::Skipped,
                "Not tabular content",
                details([("file", json!(name))]),
            );
            None
        }
        Err(e) => {
            let mut info = details([("file", json!(name))]);
            if let ParseError::TemplatesExhausted { attempts, .. } = &e {
                info.insert("attempts".to_string(), json!(attempts));
            }
            ctx.record(step_name, StepStatus::Failure, e.to_string(), info);
            None
        }
    }
}

/// Extracted file names relative to the working directory, `/`-separated.
fn relative_names(outcome: &ExtractionOutcome, working_dir: &Path) -> Vec<String> {
    outcome
        .extracted_files
        .iter()
        .map(|file| {
            let relative = file.strip_prefix(working_dir).unwrap_or(file);
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect()
}

fn close_working_dir(dir: TempDir) {
    if let Err(e) = dir.close() {
        warn!("Could not remove working directory: {}", e);
    }
}
