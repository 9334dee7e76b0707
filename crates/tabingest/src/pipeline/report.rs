//! Step outcomes and the sinks that consume them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Partial,
    Skipped,
    Failure,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Skipped => "skipped",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One numbered step of a run. Immutable once handed to a sink.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step_number: u32,
    pub step_name: String,
    pub status: StepStatus,
    pub message: String,
    /// Insertion-ordered.
    pub details: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineRunResult {
    pub run_id: String,
    pub source_filename: String,
    pub size_bytes: u64,
    pub overall_success: bool,
    pub step_outcomes: Vec<StepOutcome>,
}

impl PipelineRunResult {
    pub fn steps_with(&self, status: StepStatus) -> impl Iterator<Item = &StepOutcome> {
        self.step_outcomes.iter().filter(move |s| s.status == status)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub status_message: String,
    /// True only if every run succeeded.
    pub overall_success: bool,
    pub runs: Vec<PipelineRunResult>,
}

/// Everything a sink is told, in emission order.
#[derive(Debug, Clone, Copy)]
pub enum ReportEvent<'a> {
    RunStarted {
        run_id: &'a str,
        source_filename: &'a str,
        size_bytes: u64,
    },
    Step(&'a StepOutcome),
    RunFinished(&'a PipelineRunResult),
    BatchFinished {
        status_message: &'a str,
        runs: &'a [PipelineRunResult],
    },
}

pub trait ReportSink: Send + Sync {
    fn report(&self, event: ReportEvent<'_>);
}

/// No-op sink for unit tests and callers that only need the return values.
pub struct NoopReport;

impl ReportSink for NoopReport {
    fn report(&self, _event: ReportEvent<'_>) {}
}

/// Writes the report stream to the tracing subscriber.
pub struct TracingReport;

impl ReportSink for TracingReport {
    fn report(&self, event: ReportEvent<'_>) {
        match event {
            ReportEvent::RunStarted {
                run_id,
                source_filename,
                size_bytes,
            } => {
                info!(
                    "==== Processing '{}' ({}), run {} ====",
                    source_filename,
                    format_size(size_bytes),
                    run_id
                );
            }
            ReportEvent::Step(step) => match step.status {
                StepStatus::Success | StepStatus::Skipped => info!(
                    "Step {} [{}] {}: {}",
                    step.step_number, step.status, step.step_name, step.message
                ),
                StepStatus::Partial => warn!(
                    "Step {} [{}] {}: {}",
                    step.step_number, step.status, step.step_name, step.message
                ),
                StepStatus::Failure => error!(
                    "Step {} [{}] {}: {}",
                    step.step_number, step.status, step.step_name, step.message
                ),
            },
            ReportEvent::RunFinished(result) => {
                if result.overall_success {
                    info!(
                        "==== '{}' finished: success ({} steps) ====",
                        result.source_filename,
                        result.step_outcomes.len()
                    );
                } else {
                    error!(
                        "==== '{}' finished: failure ({} steps) ====",
                        result.source_filename,
                        result.step_outcomes.len()
                    );
                }
            }
            ReportEvent::BatchFinished { status_message, .. } => {
                info!("{}", status_message);
            }
        }
    }
}

/// `"1.50 MB"` from one MiB up, plain bytes below.
pub fn format_size(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
