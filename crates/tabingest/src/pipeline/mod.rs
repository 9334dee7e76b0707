pub mod config;
pub mod context;
pub mod report;
pub mod runner;

pub use config::PipelineConfig;
pub use context::RunContext;
pub use report::{
    format_size, BatchOutcome, NoopReport, PipelineRunResult, ReportEvent, ReportSink,
    StepOutcome, StepStatus, TracingReport,
};
pub use runner::Pipeline;
