use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use itertools::{Either, Itertools};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::content::ConverterRegistry;
use crate::logic::reconcile::reconcile_by_model_type;
use crate::logic::IdentifierMap;
use crate::model::{FileContent, Model, ModelType, ModelTypes, Project, ProjectBundle, ProjectDescriptor};
use crate::store::traits::Store;

/// Order in which identifiers are registered and contents rewritten
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportStrategy {
    /// Register every identifier first, then reconcile all contents
    #[default]
    TwoPass,
    /// Reconcile each content right after its own registration. References
    /// to models imported later are left unresolved.
    SinglePass,
}

/// Outcome of a successful import
#[derive(Debug, Clone)]
pub struct ImportedProject {
    pub project: Project,
    pub models: Vec<Model>,
    pub identifiers: IdentifierMap,
}

enum BundleEntry<'b> {
    Content(&'b ModelType, String, &'b FileContent),
    Metadata(&'b ModelType, String, &'b FileContent),
}

/// Imports an unpacked project archive: creates the project and its models,
/// assigns new identities and rewrites the cross references between model
/// contents accordingly.
pub struct ProjectImporter<'a, S: Store> {
    store: &'a S,
    model_types: &'a ModelTypes,
    converters: &'a ConverterRegistry,
    strategy: ImportStrategy,
}

impl<'a, S: Store> ProjectImporter<'a, S> {
    pub fn new(store: &'a S, model_types: &'a ModelTypes, converters: &'a ConverterRegistry) -> Self {
        Self {
            store,
            model_types,
            converters,
            strategy: ImportStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: ImportStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Import `bundle` as a new project named `name` (the bundle name when absent).
    ///
    /// Nothing is persisted when the import fails: the partially created
    /// project is deleted before the error is returned.
    pub async fn import_project(&self, bundle: &ProjectBundle, name: Option<&str>) -> Result<ImportedProject> {
        let name = name.unwrap_or(&bundle.name).to_string();
        if name.is_empty() {
            bail!("Project name is required");
        }
        if self.store.find_project_by_name(&name).await?.is_some() {
            bail!("A project with the name '{}' already exists", name);
        }

        let description = self.read_descriptor(bundle).and_then(|descriptor| descriptor.description);
        let project = self
            .store
            .create_project(Project::new(name, description))
            .await
            .context("Failed to create project")?;
        info!("Importing project {} ({})", project.name, project.id);

        match self.import_models(&project, bundle).await {
            Ok((models, identifiers)) => {
                info!(
                    "Imported {} models into project {}, {} identifiers reconciled",
                    models.len(),
                    project.name,
                    identifiers.len()
                );
                Ok(ImportedProject {
                    project,
                    models,
                    identifiers,
                })
            }
            Err(error) => {
                warn!("Import of project {} failed, rolling back: {:#}", project.name, error);
                if let Err(cleanup) = self.store.delete_project(&project.id).await {
                    warn!("Failed to delete partially imported project {}: {:#}", project.id, cleanup);
                }
                Err(error)
            }
        }
    }

    fn read_descriptor(&self, bundle: &ProjectBundle) -> Option<ProjectDescriptor> {
        let file = bundle.find_file(&format!("{}.json", bundle.name))?;
        match serde_json::from_slice(&file.bytes) {
            Ok(descriptor) => Some(descriptor),
            Err(error) => {
                warn!("Ignoring unreadable project descriptor {}: {}", file.filename, error);
                None
            }
        }
    }

    fn classify<'b>(&self, bundle: &'b ProjectBundle) -> Vec<BundleEntry<'b>>
    where
        'a: 'b,
    {
        let descriptor = format!("{}.json", bundle.name);
        bundle
            .files
            .iter()
            .filter_map(|file| {
                let Some(folder) = file.folder() else {
                    if file.filename != descriptor {
                        warn!("Skipping file {} outside of any model folder", file.filename);
                    }
                    return None;
                };
                let Some(model_type) = self.model_types.find_by_folder(folder) else {
                    warn!("Skipping file {}: unknown model folder {}", file.filename, folder);
                    return None;
                };
                let base_name = file.base_name();
                if let Some(name) = model_type.model_name_from_metadata_file(base_name) {
                    return Some(BundleEntry::Metadata(model_type, name, file));
                }
                if let Some(name) = model_type.model_name_from_content_file(base_name) {
                    return Some(BundleEntry::Content(model_type, name, file));
                }
                warn!("Skipping file {}: not a {} file", file.filename, model_type.name);
                None
            })
            .collect()
    }

    async fn import_models(&self, project: &Project, bundle: &ProjectBundle) -> Result<(Vec<Model>, IdentifierMap)> {
        let (contents, metadata): (Vec<_>, Vec<_>) =
            self.classify(bundle).into_iter().partition_map(|entry| match entry {
                BundleEntry::Content(model_type, name, file) => Either::Left((model_type, name, file)),
                BundleEntry::Metadata(model_type, name, file) => Either::Right((model_type, name, file)),
            });

        let mut identifiers = IdentifierMap::new();
        let mut created: Vec<(Model, &FileContent)> = Vec::with_capacity(contents.len());

        for (model_type, name, file) in contents {
            let model = self.create_model(project, model_type, name, file, &mut identifiers).await?;
            let model = match self.strategy {
                ImportStrategy::SinglePass => self.store_content(&model, file, &identifiers).await?,
                ImportStrategy::TwoPass => model,
            };
            created.push((model, file));
        }

        let mut models = Vec::with_capacity(created.len());
        for (model, file) in created {
            let model = match self.strategy {
                ImportStrategy::TwoPass => self.store_content(&model, file, &identifiers).await?,
                ImportStrategy::SinglePass => model,
            };
            models.push(model);
        }

        let mut by_name: HashMap<(String, String), usize> = models
            .iter()
            .enumerate()
            .map(|(index, model)| ((model.model_type.clone(), model.name.clone()), index))
            .collect();
        for (model_type, name, file) in metadata {
            let Some(index) = by_name.remove(&(model_type.name.clone(), name.clone())) else {
                warn!("Skipping metadata file {}: no {} model named {}", file.filename, model_type.name, name);
                continue;
            };
            models[index] = self.apply_metadata(&models[index], file).await?;
        }

        Ok((models, identifiers))
    }

    /// Create the model and register its original content id
    async fn create_model(
        &self,
        project: &Project,
        model_type: &ModelType,
        name: String,
        file: &FileContent,
        identifiers: &mut IdentifierMap,
    ) -> Result<Model> {
        let content = self
            .converters
            .decode(&model_type.name, &file.bytes)
            .with_context(|| format!("Invalid content in {}", file.filename))?;

        let mut model = Model::new(project.id.clone(), name, model_type);
        model.template = content.as_ref().and_then(|c| c.template()).map(str::to_string);
        let model = self
            .store
            .create_model(model)
            .await
            .with_context(|| format!("Failed to create model for {}", file.filename))?;

        if let Some(original_id) = content.as_ref().and_then(|c| c.id()) {
            debug!("{} -> {}", original_id, model.content_id());
            identifiers.register(original_id, &model.content_id());
        }
        Ok(model)
    }

    async fn store_content(&self, model: &Model, file: &FileContent, identifiers: &IdentifierMap) -> Result<Model> {
        let content = reconcile_by_model_type(self.converters, &model.model_type, &file.bytes, identifiers)
            .with_context(|| format!("Failed to reconcile {}", file.filename))?;
        self.store.update_model_content(&model.id, content).await
    }

    async fn apply_metadata(&self, model: &Model, file: &FileContent) -> Result<Model> {
        let metadata: serde_json::Value = serde_json::from_slice(&file.bytes)
            .with_context(|| format!("Invalid metadata file {}", file.filename))?;
        let mut model = self
            .store
            .get_model(&model.id)
            .await?
            .with_context(|| format!("Model {} disappeared during import", model.id))?;
        model.extensions = metadata.get("extensions").cloned();
        self.store.update_model(model).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::decode_process_content;
    use crate::store::{MemoryStore, ModelStore, ProjectStore};
    use crate::model::{FORM, PROCESS};

    const MAIN: &str = r#"<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
  <process id="Process_main" name="main">
    <callActivity id="Call_1" calledElement="Process_sub"/>
    <userTask id="Task_1" formKey="form-legacy"/>
  </process>
</definitions>"#;

    const SUB: &str = r#"<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
  <process id="Process_sub" name="sub"/>
</definitions>"#;

    fn bundle() -> ProjectBundle {
        let mut bundle = ProjectBundle::new("demo");
        bundle.files.push(FileContent::from_path("processes/main.bpmn20.xml", MAIN.as_bytes().to_vec()));
        bundle.files.push(FileContent::from_path("processes/sub.bpmn20.xml", SUB.as_bytes().to_vec()));
        bundle.files.push(FileContent::from_path(
            "forms/legacy.json",
            br#"{"formRepresentation":{"id":"form-legacy","name":"legacy"}}"#.to_vec(),
        ));
        bundle
    }

    async fn called_element(store: &MemoryStore, models: &[Model], name: &str) -> Option<String> {
        let model = models.iter().find(|m| m.name == name)?;
        let content = store.get_model_content(&model.id).await.ok()??;
        let process = decode_process_content(&content).ok()??;
        let reference = process
            .flow_elements()
            .find(|element| element.id == "Call_1")
            .and_then(|element| element.reference().map(str::to_string));
        reference
    }

    #[tokio::test]
    async fn test_two_pass_resolves_forward_references() {
        let store = MemoryStore::new();
        let types = ModelTypes::default();
        let converters = ConverterRegistry::with_defaults();

        let imported = ProjectImporter::new(&store, &types, &converters)
            .import_project(&bundle(), None)
            .await
            .unwrap();

        let sub = imported.models.iter().find(|m| m.name == "sub").unwrap();
        assert_eq!(
            called_element(&store, &imported.models, "main").await,
            Some(sub.content_id())
        );
        assert_eq!(imported.identifiers.len(), 3);
    }

    #[tokio::test]
    async fn test_single_pass_leaves_forward_references() {
        let store = MemoryStore::new();
        let types = ModelTypes::default();
        let converters = ConverterRegistry::with_defaults();

        let imported = ProjectImporter::new(&store, &types, &converters)
            .with_strategy(ImportStrategy::SinglePass)
            .import_project(&bundle(), None)
            .await
            .unwrap();

        assert_eq!(
            called_element(&store, &imported.models, "main").await,
            Some("Process_sub".to_string())
        );
    }

    #[tokio::test]
    async fn test_duplicate_project_name_is_rejected() {
        let store = MemoryStore::new();
        let types = ModelTypes::default();
        let converters = ConverterRegistry::with_defaults();
        let importer = ProjectImporter::new(&store, &types, &converters);

        importer.import_project(&bundle(), None).await.unwrap();
        assert!(importer.import_project(&bundle(), None).await.is_err());
        assert!(importer.import_project(&bundle(), Some("other")).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_import_leaves_nothing_behind() {
        let store = MemoryStore::new();
        let types = ModelTypes::default();
        let converters = ConverterRegistry::with_defaults();

        let mut bundle = bundle();
        bundle.files.push(FileContent::from_path("forms/broken.json", br#"{"id":"no-envelope"}"#.to_vec()));

        let result = ProjectImporter::new(&store, &types, &converters)
            .import_project(&bundle, None)
            .await;
        assert!(result.is_err());
        assert!(store.list_projects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_and_unknown_files() {
        let store = MemoryStore::new();
        let types = ModelTypes::default();
        let converters = ConverterRegistry::with_defaults();

        let mut bundle = bundle();
        bundle.files.push(FileContent::from_path(
            "processes/main-extensions.json",
            br#"{"id":"Process_main","name":"main","extensions":{"constants":{}}}"#.to_vec(),
        ));
        bundle.files.push(FileContent::from_path("images/logo.png", vec![1, 2, 3]));
        bundle.files.push(FileContent::from_path("README.txt", b"hello".to_vec()));

        let imported = ProjectImporter::new(&store, &types, &converters)
            .import_project(&bundle, None)
            .await
            .unwrap();

        assert_eq!(imported.models.len(), 3);
        let main = imported.models.iter().find(|m| m.name == "main").unwrap();
        assert_eq!(main.model_type, PROCESS);
        assert_eq!(main.extensions, Some(serde_json::json!({"constants": {}})));
        let stored = store.get_model(&main.id).await.unwrap().unwrap();
        assert!(!stored.content.is_empty());

        let form = imported.models.iter().find(|m| m.model_type == FORM).unwrap();
        assert_eq!(imported.identifiers.get("form-legacy"), Some(form.content_id().as_str()));
    }
}
