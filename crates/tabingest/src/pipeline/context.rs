use chrono::Utc;
use serde_json::{Map, Value};

use super::report::{PipelineRunResult, ReportEvent, ReportSink, StepOutcome, StepStatus};

/// Per-run step recorder.
///
/// Owns the step counter so numbering stays gapless from 1, forwards every
/// outcome to the sink as it is recorded, and tracks overall success.
pub struct RunContext<'a> {
    run_id: String,
    source_filename: String,
    size_bytes: u64,
    sink: &'a dyn ReportSink,
    outcomes: Vec<StepOutcome>,
    overall_success: bool,
}

impl<'a> RunContext<'a> {
    /// Emits `RunStarted`.
    pub fn start(
        run_id: String,
        source_filename: String,
        size_bytes: u64,
        sink: &'a dyn ReportSink,
    ) -> Self {
        sink.report(ReportEvent::RunStarted {
            run_id: &run_id,
            source_filename: &source_filename,
            size_bytes,
        });
        Self {
            run_id,
            source_filename,
            size_bytes,
            sink,
            outcomes: Vec::new(),
            overall_success: true,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Appends a step; a `Failure` clears overall success.
    pub fn record(
        &mut self,
        step_name: impl Into<String>,
        status: StepStatus,
        message: impl Into<String>,
        details: Map<String, Value>,
    ) {
        if status == StepStatus::Failure {
            self.overall_success = false;
        }
        let outcome = StepOutcome {
            step_number: self.outcomes.len() as u32 + 1,
            step_name: step_name.into(),
            status,
            message: message.into(),
            details,
            timestamp: Utc::now(),
        };
        self.sink.report(ReportEvent::Step(&outcome));
        self.outcomes.push(outcome);
    }

    /// Emits `RunFinished` and hands back the result.
    pub fn finish(self) -> PipelineRunResult {
        let result = PipelineRunResult {
            run_id: self.run_id,
            source_filename: self.source_filename,
            size_bytes: self.size_bytes,
            overall_success: self.overall_success,
            step_outcomes: self.outcomes,
        };
        self.sink.report(ReportEvent::RunFinished(&result));
        result
    }
}

/// Builds an ordered details map from `(key, value)` pairs.
pub fn details<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
