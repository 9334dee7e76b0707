pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod logging;
pub mod parse;
pub mod pipeline;
pub mod sanitize;
pub mod upload;

pub use classify::{classify, CategoryMap, ClassificationResult, ContentCategory};
pub use config::{load_config, Config, ParseTemplate};
pub use db::Database;
pub use error::{
    ClassifyError, ConfigError, ExtractionError, ParseError, Result, TabingestError, UploadError,
};
pub use extract::{extract, ExtractionOutcome};
pub use parse::{ParseResult, TableParser};
pub use pipeline::{
    BatchOutcome, Pipeline, PipelineConfig, PipelineRunResult, ReportEvent, ReportSink,
    StepOutcome, StepStatus,
};
pub use upload::{stage_upload, stage_uploads};
