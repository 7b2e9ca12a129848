use anyhow::{Context, Result};
use log::{info, warn};
use serde_json::json;

use crate::content::ConverterRegistry;
use crate::model::{FileContent, Id, Model, ModelType, ModelTypes, ProjectBundle, ProjectDescriptor, CONTENT_TYPE_JSON};
use crate::store::traits::Store;

/// Builds the archive layout of a stored project
pub struct ProjectExporter<'a, S: Store> {
    store: &'a S,
    model_types: &'a ModelTypes,
    converters: &'a ConverterRegistry,
}

impl<'a, S: Store> ProjectExporter<'a, S> {
    pub fn new(store: &'a S, model_types: &'a ModelTypes, converters: &'a ConverterRegistry) -> Self {
        Self {
            store,
            model_types,
            converters,
        }
    }

    pub async fn export_project(&self, project_id: &Id) -> Result<ProjectBundle> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .with_context(|| format!("Project {} not found", project_id))?;

        let mut bundle = ProjectBundle::new(project.name.clone());
        bundle.files.push(FileContent::new(
            format!("{}.json", project.name),
            CONTENT_TYPE_JSON,
            serde_json::to_vec_pretty(&ProjectDescriptor::from(&project))?,
        ));

        for model in self.store.list_models(&project.id).await? {
            let Some(model_type) = self.model_types.find_by_name(&model.model_type) else {
                warn!("Skipping model {} of unknown type {}", model.name, model.model_type);
                continue;
            };
            let content = self.store.get_model_content(&model.id).await?.unwrap_or_default();
            if !model_type.json {
                bundle.files.push(self.metadata_file(&model, model_type, &content)?);
            }
            bundle.files.push(FileContent::new(
                model_type.content_file_name(&model.name),
                model.content_type.clone(),
                content,
            ));
        }

        info!("Exported project {} with {} files", project.name, bundle.files.len());
        Ok(bundle)
    }

    /// `<folder>/<name><suffix>.json` with the id the content declares
    fn metadata_file(&self, model: &Model, model_type: &ModelType, content: &[u8]) -> Result<FileContent> {
        let id = match self.converters.decode(&model.model_type, content) {
            Ok(decoded) => decoded.and_then(|c| c.id().map(str::to_string)),
            Err(error) => {
                warn!("Unable to read the id of model {}: {}", model.name, error);
                None
            }
        }
        .unwrap_or_else(|| model.content_id());

        let metadata = json!({
            "id": id,
            "name": model.name,
            "type": model.model_type,
            "extensions": model.extensions.clone().unwrap_or_else(|| json!({})),
        });
        Ok(FileContent::new(
            model_type.metadata_file_name(&model.name),
            CONTENT_TYPE_JSON,
            serde_json::to_vec_pretty(&metadata)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Project, DECISION, PROCESS};
    use crate::store::{MemoryStore, ModelStore, ProjectStore};

    #[tokio::test]
    async fn test_export_layout() {
        let store = MemoryStore::new();
        let types = ModelTypes::default();
        let converters = ConverterRegistry::with_defaults();

        let project = store
            .create_project(Project::new("demo".to_string(), Some("Demo project".to_string())))
            .await
            .unwrap();
        let process_type = types.find_by_name(PROCESS).unwrap();
        let process = store
            .create_model(Model::new(project.id.clone(), "main".to_string(), process_type))
            .await
            .unwrap();
        let content = format!(
            r#"<definitions><process id="{}" name="main"/></definitions>"#,
            process.content_id()
        );
        store.update_model_content(&process.id, content.into_bytes()).await.unwrap();
        let decision_type = types.find_by_name(DECISION).unwrap();
        let decision = store
            .create_model(Model::new(project.id.clone(), "rules".to_string(), decision_type))
            .await
            .unwrap();

        let bundle = ProjectExporter::new(&store, &types, &converters)
            .export_project(&project.id)
            .await
            .unwrap();

        let descriptor: ProjectDescriptor =
            serde_json::from_slice(&bundle.find_file("demo.json").unwrap().bytes).unwrap();
        assert_eq!(descriptor.description.as_deref(), Some("Demo project"));
        assert!(bundle.find_file("processes/main.bpmn20.xml").is_some());

        let metadata: serde_json::Value =
            serde_json::from_slice(&bundle.find_file("processes/main-extensions.json").unwrap().bytes).unwrap();
        assert_eq!(metadata["id"], process.content_id());
        assert_eq!(metadata["type"], PROCESS);
        assert_eq!(metadata["extensions"], json!({}));

        // no converter for decisions: the id falls back to the model identity
        let metadata: serde_json::Value =
            serde_json::from_slice(&bundle.find_file("decision-tables/rules-extensions.json").unwrap().bytes).unwrap();
        assert_eq!(metadata["id"], decision.content_id());
    }

    #[tokio::test]
    async fn test_export_of_unknown_project_fails() {
        let store = MemoryStore::new();
        let types = ModelTypes::default();
        let converters = ConverterRegistry::with_defaults();
        assert!(ProjectExporter::new(&store, &types, &converters)
            .export_project(&"missing".to_string())
            .await
            .is_err());
    }
}
