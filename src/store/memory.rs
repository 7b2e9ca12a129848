use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use parking_lot::RwLock;

use crate::model::{generate_id, now_rfc3339, Id, Model, Project};
use crate::store::traits::{ModelStore, ProjectStore, Store};

/// In-memory store backing the command line tool and the tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: RwLock<HashMap<Id, Project>>,
    /// Models keyed by model id
    models: RwLock<HashMap<Id, Model>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ProjectStore for MemoryStore {
    async fn get_project(&self, id: &Id) -> Result<Option<Project>> {
        Ok(self.projects.read().get(id).cloned())
    }

    async fn find_project_by_name(&self, name: &str) -> Result<Option<Project>> {
        Ok(self
            .projects
            .read()
            .values()
            .find(|project| project.name == name)
            .cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> = self.projects.read().values().cloned().collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    async fn create_project(&self, project: Project) -> Result<Project> {
        let mut projects = self.projects.write();
        if projects.values().any(|existing| existing.name == project.name) {
            bail!("A project with the name '{}' already exists", project.name);
        }
        projects.insert(project.id.clone(), project.clone());
        Ok(project)
    }

    async fn delete_project(&self, id: &Id) -> Result<bool> {
        let removed = self.projects.write().remove(id).is_some();
        if removed {
            self.models.write().retain(|_, model| &model.project_id != id);
        }
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl ModelStore for MemoryStore {
    async fn get_model(&self, id: &Id) -> Result<Option<Model>> {
        Ok(self.models.read().get(id).cloned())
    }

    async fn list_models(&self, project_id: &Id) -> Result<Vec<Model>> {
        let mut models: Vec<Model> = self
            .models
            .read()
            .values()
            .filter(|model| &model.project_id == project_id)
            .cloned()
            .collect();
        models.sort_by(|a, b| (&a.model_type, &a.name).cmp(&(&b.model_type, &b.name)));
        Ok(models)
    }

    async fn create_model(&self, mut model: Model) -> Result<Model> {
        if !self.projects.read().contains_key(&model.project_id) {
            bail!("Project {} not found", model.project_id);
        }
        model.id = generate_id();
        self.models.write().insert(model.id.clone(), model.clone());
        Ok(model)
    }

    async fn update_model(&self, mut model: Model) -> Result<Model> {
        let mut models = self.models.write();
        if !models.contains_key(&model.id) {
            bail!("Model {} not found", model.id);
        }
        model.updated_at = now_rfc3339();
        models.insert(model.id.clone(), model.clone());
        Ok(model)
    }

    async fn update_model_content(&self, id: &Id, content: Vec<u8>) -> Result<Model> {
        let mut models = self.models.write();
        let model = models
            .get_mut(id)
            .ok_or_else(|| anyhow!("Model {} not found", id))?;
        model.content = content;
        model.updated_at = now_rfc3339();
        Ok(model.clone())
    }

    async fn get_model_content(&self, id: &Id) -> Result<Option<Vec<u8>>> {
        Ok(self.models.read().get(id).map(|model| model.content.clone()))
    }

    async fn delete_model(&self, id: &Id) -> Result<bool> {
        Ok(self.models.write().remove(id).is_some())
    }
}

impl Store for MemoryStore {}
