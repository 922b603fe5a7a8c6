//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::FaktConfig;
use std::path::Path;

/// Name of the configuration file at a project root.
pub const CONFIG_FILE_NAME: &str = "fakt.toml";

/// Loads and validates `fakt.toml` from a project directory.
pub fn load_config(project_dir: &Path) -> Result<FaktConfig, ConfigError> {
    load_config_file(&project_dir.join(CONFIG_FILE_NAME))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<FaktConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `fakt.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<FaktConfig, ConfigError> {
    let config: FaktConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates required fields and cross-references between sections.
fn validate_config(config: &FaktConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.project.generated_dir.is_empty() {
        return Err(ConfigError::MissingField("project.generated_dir".to_string()));
    }
    if config.cache.store_file.is_empty() || config.cache.store_file.contains(['/', '\\']) {
        return Err(ConfigError::ValidationError(format!(
            "cache.store_file must be a plain file name, got '{}'",
            config.cache.store_file
        )));
    }

    for (name, node) in &config.nodes {
        for parent in &node.depends_on {
            if !config.nodes.contains_key(parent) {
                return Err(ConfigError::ValidationError(format!(
                    "node '{name}' depends on undeclared node '{parent}'"
                )));
            }
        }
    }

    if let Some(root) = &config.hierarchy.shared_root {
        if !config.nodes.contains_key(root) {
            return Err(ConfigError::UnknownNode(root.clone()));
        }
    }

    if let Some(routing) = &config.routing {
        if routing.default_destination.is_empty() {
            return Err(ConfigError::MissingField(
                "routing.default_destination".to_string(),
            ));
        }
    }
    Ok(())
}
