use std::path::PathBuf;

use crate::classify::CategoryMap;
use crate::config::{validate_config, Config, ParseTemplate};
use crate::error::ConfigError;

/// Runtime configuration with every directory resolved against the root.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub database_path: PathBuf,
    pub upload_dir: PathBuf,
    /// Parent of the per-run working directories.
    pub extraction_dir: PathBuf,
    pub categories: CategoryMap,
    pub templates: Vec<ParseTemplate>,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        validate_config(config)?;
        let root = config.root();

        Ok(Self {
            database_path: root.join(&config.database_name),
            upload_dir: root.join(&config.upload_dir_name),
            extraction_dir: root.join(&config.extraction_dir_name),
            categories: CategoryMap::from_config(&config.mime_categories)?,
            templates: config.templates.clone(),
        })
    }
}
