use std::collections::HashSet;
use std::path::Path;

use crate::classify::ContentCategory;
use crate::config::schema::{Config, ParseTemplate};
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    for (label, value) in [
        ("database_name", &config.database_name),
        ("upload_dir_name", &config.upload_dir_name),
        ("extraction_dir_name", &config.extraction_dir_name),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("{} must not be empty", label),
            });
        }
    }

    if config.upload_dir_name == config.extraction_dir_name {
        return Err(ConfigError::Validation {
            message: "upload_dir_name and extraction_dir_name must differ".to_string(),
        });
    }

    for (mime, category) in &config.mime_categories {
        if ContentCategory::from_name(category).is_none() {
            return Err(ConfigError::UnknownCategory {
                mime: mime.clone(),
                category: category.clone(),
            });
        }
    }

    if config.templates.is_empty() {
        return Err(ConfigError::Validation {
            message: "At least one parsing template is required".to_string(),
        });
    }

    let mut names = HashSet::new();
    for template in &config.templates {
        if !names.insert(&template.name) {
            return Err(ConfigError::InvalidTemplate {
                name: template.name.clone(),
                reason: "Duplicate template name".to_string(),
            });
        }
        validate_template(template)?;
    }

    Ok(())
}

fn validate_template(template: &ParseTemplate) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidTemplate {
        name: template.name.clone(),
        reason,
    };

    if template.name.trim().is_empty() {
        return Err(invalid("Template name must not be empty".to_string()));
    }
    if !template.delimiter.is_ascii() || matches!(template.delimiter, '"' | '\n' | '\r') {
        return Err(invalid(format!(
            "Delimiter {:?} must be a single-byte ASCII character other than quote or newline",
            template.delimiter
        )));
    }
    if encoding_rs::Encoding::for_label(template.encoding.as_bytes()).is_none() {
        return Err(invalid(format!("Unknown encoding '{}'", template.encoding)));
    }
    if template.min_columns == 0 {
        return Err(invalid("min_columns must be at least 1".to_string()));
    }

    Ok(())
}
