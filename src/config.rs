use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logic::{DirectoryResourceLoader, EmbeddedResourceLoader, ImportStrategy, ResourceLoader};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub schema: SchemaConfig,
    pub import: ImportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Root of on-disk schema resources; the built-in schemas are used when unset
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportConfig {
    pub strategy: ImportStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("config").required(false));

        // Add environment variables with prefix "MODELING_"
        config = config.add_source(
            config::Environment::with_prefix("MODELING")
                .separator("_")
                .prefix_separator("_"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Loader for schema resources referenced by the extensions schemas
    pub fn resource_loader(&self) -> Box<dyn ResourceLoader> {
        match &self.schema.directory {
            Some(directory) => Box::new(DirectoryResourceLoader::new(directory)),
            None => Box::new(EmbeddedResourceLoader::with_builtin_schemas()),
        }
    }
}
