use crate::model::{Id, Model, Project};
use anyhow::Result;

#[async_trait::async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get_project(&self, id: &Id) -> Result<Option<Project>>;
    async fn find_project_by_name(&self, name: &str) -> Result<Option<Project>>;
    async fn list_projects(&self) -> Result<Vec<Project>>;
    async fn create_project(&self, project: Project) -> Result<Project>;
    /// Deletes the project and all of its models
    async fn delete_project(&self, id: &Id) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait ModelStore: Send + Sync {
    async fn get_model(&self, id: &Id) -> Result<Option<Model>>;
    async fn list_models(&self, project_id: &Id) -> Result<Vec<Model>>;
    /// Stores a new model under a freshly generated id and returns it
    async fn create_model(&self, model: Model) -> Result<Model>;
    async fn update_model(&self, model: Model) -> Result<Model>;
    async fn update_model_content(&self, id: &Id, content: Vec<u8>) -> Result<Model>;
    async fn get_model_content(&self, id: &Id) -> Result<Option<Vec<u8>>>;
    async fn delete_model(&self, id: &Id) -> Result<bool>;
}

pub trait Store: ProjectStore + ModelStore + Send + Sync {}
