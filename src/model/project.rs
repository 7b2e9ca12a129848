use crate::model::{generate_id, now_rfc3339, Id};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String, // ISO 8601 timestamp
    pub updated_at: String,
}

impl Project {
    pub fn new(name: String, description: Option<String>) -> Self {
        let now = now_rfc3339();
        Self {
            id: generate_id(),
            name,
            description,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Descriptor written at the root of an exported project bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&Project> for ProjectDescriptor {
    fn from(project: &Project) -> Self {
        Self {
            name: project.name.clone(),
            description: project.description.clone(),
        }
    }
}
