pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, validate_config};
pub use schema::{default_root_directory, default_templates, Config, LoggingConfig, ParseTemplate};
