use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use log::{info, warn};
use modeling_service::config::AppConfig;
use modeling_service::logic::{
    read_bundle_dir, write_bundle_dir, ContentValidator, ExtensionsValidator, SchemaFlattener,
};
use modeling_service::store::ModelStore;
use modeling_service::{ConverterRegistry, MemoryStore, ModelTypes, ProjectExporter, ProjectImporter};

const USAGE: &str = "usage:
  modeling-service import <project-dir> <output-dir>
  modeling-service flatten <schema-file>
  modeling-service validate <model-type> <extensions-file>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.logging.level.as_str()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["import", project_dir, output_dir] => import(&config, Path::new(project_dir), Path::new(output_dir)).await,
        ["flatten", schema_file] => flatten(&config, Path::new(schema_file)).await,
        ["validate", model_type, extensions_file] => validate(&config, model_type, Path::new(extensions_file)).await,
        _ => bail!("{}", USAGE),
    }
}

/// Import a project directory and write the reconciled export next to it
async fn import(config: &AppConfig, project_dir: &Path, output_dir: &Path) -> anyhow::Result<()> {
    let bundle = read_bundle_dir(project_dir).await?;
    let model_types = ModelTypes::default();
    let converters = ConverterRegistry::with_defaults();
    let store = MemoryStore::new();

    let imported = ProjectImporter::new(&store, &model_types, &converters)
        .with_strategy(config.import.strategy)
        .import_project(&bundle, None)
        .await?;

    let loader = config.resource_loader();
    let extensions_validator = ExtensionsValidator::new(&*loader)?;
    let content_validator = ContentValidator::new();
    for model in &imported.models {
        let content = store.get_model_content(&model.id).await?.unwrap_or_default();
        if let Some(model_type) = model_types.find_by_name(&model.model_type) {
            for error in content_validator.validate(model_type, &content) {
                warn!("{} {}: {}", model.model_type, model.name, error.problem);
            }
        }
        if let Some(extensions) = &model.extensions {
            let metadata = serde_json::json!({ "name": model.name, "extensions": extensions });
            for error in extensions_validator.validate_value(&model.model_type, &metadata) {
                warn!("{} {} extensions: {}", model.model_type, model.name, error.description);
            }
        }
    }

    let exported = ProjectExporter::new(&store, &model_types, &converters)
        .export_project(&imported.project.id)
        .await?;
    let written: PathBuf = write_bundle_dir(&exported, output_dir).await?;
    info!(
        "Project {} written to {} ({} identifiers reconciled)",
        imported.project.name,
        written.display(),
        imported.identifiers.len()
    );
    Ok(())
}

async fn flatten(config: &AppConfig, schema_file: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(schema_file)
        .await
        .with_context(|| format!("Failed to read {}", schema_file.display()))?;
    let schema: serde_json::Value =
        serde_json::from_slice(&bytes).with_context(|| format!("{} is not valid JSON", schema_file.display()))?;

    let loader = config.resource_loader();
    let flattened = SchemaFlattener::new(&*loader).flatten(schema)?;
    println!("{}", serde_json::to_string_pretty(&flattened)?);
    Ok(())
}

async fn validate(config: &AppConfig, model_type: &str, extensions_file: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(extensions_file)
        .await
        .with_context(|| format!("Failed to read {}", extensions_file.display()))?;

    let loader = config.resource_loader();
    let validator = ExtensionsValidator::new(&*loader)?;
    let errors = validator.validate(&model_type.to_uppercase(), &bytes)?;
    if errors.is_empty() {
        println!("{} is valid", extensions_file.display());
        return Ok(());
    }
    for error in &errors {
        println!("{}", error.description);
    }
    bail!("{} validation errors in {}", errors.len(), extensions_file.display())
}
