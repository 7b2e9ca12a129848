use crate::model::{now_rfc3339, Id, CONTENT_TYPE_JSON, CONTENT_TYPE_XML};
use serde::{Deserialize, Serialize};

pub const PROCESS: &str = "PROCESS";
pub const FORM: &str = "FORM";
pub const CONNECTOR: &str = "CONNECTOR";
pub const DECISION: &str = "DECISION";

/// A named, typed unit of design content owned by a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: Id,
    pub project_id: Id,
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: String,
    pub content_type: String,
    #[serde(skip)]
    pub content: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Model {
    /// A model that has not been stored yet; the store assigns the id.
    pub fn new(project_id: Id, name: String, model_type: &ModelType) -> Self {
        let now = now_rfc3339();
        Self {
            id: Id::new(),
            project_id,
            name,
            model_type: model_type.name.clone(),
            content_type: model_type.content_type().to_string(),
            content: Vec::new(),
            extensions: None,
            template: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Type-qualified identifier used inside model contents, e.g. `process-<uuid>`
    pub fn content_id(&self) -> String {
        format!("{}-{}", self.model_type.to_lowercase(), self.id)
    }
}

/// Static description of a kind of model and how it is laid out in a project bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelType {
    pub name: String,
    /// Folder holding models of this type inside a project bundle
    pub folder: String,
    /// Extension used when exporting content, including the leading dot
    pub content_extension: String,
    pub allowed_extensions: Vec<String>,
    /// Suffix of the metadata file name, before `.json`
    pub metadata_suffix: String,
    /// Whether the content itself is JSON
    pub json: bool,
}

impl ModelType {
    pub fn json(name: &str, folder: &str) -> Self {
        Self {
            name: name.to_string(),
            folder: folder.to_string(),
            content_extension: ".json".to_string(),
            allowed_extensions: vec![".json".to_string()],
            metadata_suffix: String::new(),
            json: true,
        }
    }

    pub fn process() -> Self {
        Self {
            name: PROCESS.to_string(),
            folder: "processes".to_string(),
            content_extension: ".bpmn20.xml".to_string(),
            allowed_extensions: vec![".bpmn20.xml".to_string(), ".bpmn".to_string()],
            metadata_suffix: "-extensions".to_string(),
            json: false,
        }
    }

    pub fn decision() -> Self {
        Self {
            name: DECISION.to_string(),
            folder: "decision-tables".to_string(),
            content_extension: ".xml".to_string(),
            allowed_extensions: vec![".xml".to_string(), ".dmn".to_string()],
            metadata_suffix: "-extensions".to_string(),
            json: false,
        }
    }

    pub fn content_type(&self) -> &'static str {
        if self.json {
            CONTENT_TYPE_JSON
        } else {
            CONTENT_TYPE_XML
        }
    }

    /// Model name derived from a content file name, if the extension is allowed
    pub fn model_name_from_content_file(&self, file_name: &str) -> Option<String> {
        self.allowed_extensions
            .iter()
            .find(|extension| file_name.ends_with(extension.as_str()))
            .map(|extension| file_name[..file_name.len() - extension.len()].to_string())
            .filter(|name| !name.is_empty())
    }

    /// Model name derived from a metadata file name (`<name><suffix>.json`)
    pub fn model_name_from_metadata_file(&self, file_name: &str) -> Option<String> {
        if self.json {
            return None;
        }
        file_name
            .strip_suffix(".json")
            .and_then(|stem| stem.strip_suffix(self.metadata_suffix.as_str()))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    pub fn content_file_name(&self, model_name: &str) -> String {
        format!("{}/{}{}", self.folder, model_name, self.content_extension)
    }

    pub fn metadata_file_name(&self, model_name: &str) -> String {
        format!("{}/{}{}.json", self.folder, model_name, self.metadata_suffix)
    }
}

/// Registry of the model types known to the service
#[derive(Debug, Clone)]
pub struct ModelTypes {
    types: Vec<ModelType>,
}

impl Default for ModelTypes {
    fn default() -> Self {
        Self {
            types: vec![
                ModelType::process(),
                ModelType::json(FORM, "forms"),
                ModelType::json(CONNECTOR, "connectors"),
                ModelType::decision(),
            ],
        }
    }
}

impl ModelTypes {
    pub fn new(types: Vec<ModelType>) -> Self {
        Self { types }
    }

    /// Add a model type; an existing type with the same name is replaced
    pub fn register(&mut self, model_type: ModelType) {
        self.types.retain(|existing| existing.name != model_type.name);
        self.types.push(model_type);
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ModelType> {
        self.types.iter().find(|model_type| model_type.name == name)
    }

    pub fn find_by_folder(&self, folder: &str) -> Option<&ModelType> {
        self.types.iter().find(|model_type| model_type.folder == folder)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelType> {
        self.types.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_is_type_qualified() {
        let mut model = Model::new("project".to_string(), "main".to_string(), &ModelType::process());
        model.id = "1234".to_string();
        assert_eq!(model.content_id(), "process-1234");
    }

    #[test]
    fn test_model_names_from_file_names() {
        let process = ModelType::process();
        assert_eq!(
            process.model_name_from_content_file("main.bpmn20.xml"),
            Some("main".to_string())
        );
        assert_eq!(process.model_name_from_content_file("main.txt"), None);
        assert_eq!(
            process.model_name_from_metadata_file("main-extensions.json"),
            Some("main".to_string())
        );
        assert_eq!(process.model_name_from_metadata_file("main.json"), None);

        let form = ModelType::json(FORM, "forms");
        assert_eq!(form.model_name_from_content_file("login.json"), Some("login".to_string()));
        assert_eq!(form.model_name_from_metadata_file("login.json"), None);
    }

    #[test]
    fn test_model_types_lookup() {
        let types = ModelTypes::default();
        assert_eq!(types.find_by_folder("forms").map(|t| t.name.as_str()), Some(FORM));
        assert!(types.find_by_name("UNKNOWN").is_none());
    }
}
