//! Test harness for isolated pipeline runs.
//!
//! Each `TestHarness` owns a temporary root holding the inputs, the upload
//! and extraction directories and the SQLite store, plus a sink that keeps
//! every report event for later assertions.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use tabingest::config::Config;
use tabingest::db::Database;
use tabingest::pipeline::{
    Pipeline, PipelineConfig, ReportEvent, ReportSink, StepOutcome,
};

use super::builders::ConfigBuilder;

/// Owned copy of a `ReportEvent`.
#[derive(Debug, Clone)]
pub enum RecordedEvent {
    RunStarted { source_filename: String, size_bytes: u64 },
    Step(StepOutcome),
    RunFinished { source_filename: String, overall_success: bool },
    BatchFinished { status_message: String, run_count: usize },
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn steps(&self) -> Vec<StepOutcome> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::Step(step) => Some(step),
                _ => None,
            })
            .collect()
    }
}

impl ReportSink for RecordingSink {
    fn report(&self, event: ReportEvent<'_>) {
        let recorded = match event {
            ReportEvent::RunStarted {
                source_filename,
                size_bytes,
                ..
            } => RecordedEvent::RunStarted {
                source_filename: source_filename.to_string(),
                size_bytes,
            },
            ReportEvent::Step(step) => RecordedEvent::Step(step.clone()),
            ReportEvent::RunFinished(result) => RecordedEvent::RunFinished {
                source_filename: result.source_filename.clone(),
                overall_success: result.overall_success,
            },
            ReportEvent::BatchFinished {
                status_message,
                runs,
            } => RecordedEvent::BatchFinished {
                status_message: status_message.to_string(),
                run_count: runs.len(),
            },
        };
        self.events.lock().unwrap().push(recorded);
    }
}

/// Test harness providing an isolated execution environment.
pub struct TestHarness {
    temp_dir: TempDir,
    /// Where test inputs are written; separate from the pipeline root.
    pub input_dir: PathBuf,
    /// Root directory of the pipeline configuration.
    pub root_dir: PathBuf,
    pub sink: Arc<RecordingSink>,
    config: Config,
}

impl TestHarness {
    /// Harness with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ConfigBuilder::new())
    }

    /// Harness with a customised configuration; the root is always the
    /// harness's own temporary directory.
    pub fn with_config(builder: ConfigBuilder) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let input_dir = temp_dir.path().join("input");
        let root_dir = temp_dir.path().join("root");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");

        let config = builder.root(&root_dir).build();

        Self {
            temp_dir,
            input_dir,
            root_dir,
            sink: Arc::new(RecordingSink::default()),
            config,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::from_config(&self.config).expect("Invalid test config")
    }

    /// Opens a fresh pipeline (and database handle) on the harness store.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::from_config(Arc::new(self.pipeline_config()), self.sink.clone())
            .expect("Failed to open pipeline")
    }

    /// Separate handle on the same store, for assertions.
    pub fn database(&self) -> Database {
        Database::open(&self.pipeline_config().database_path).expect("Failed to open database")
    }

    /// Write a test input file to the input directory.
    pub fn write_input(&self, filename: &str, content: &[u8]) -> PathBuf {
        let path = self.input_dir.join(filename);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create input subdir");
        }
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    /// Entries left in the extraction base directory.
    pub fn leftover_work_dirs(&self) -> usize {
        match std::fs::read_dir(self.pipeline_config().extraction_dir) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
