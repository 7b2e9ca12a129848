use uuid::Uuid;

pub type Id = String;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_XML: &str = "application/xml";

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// A single file of a project bundle: a model content file, a model metadata
/// file or the project descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FileContent {
    /// Path inside the bundle, e.g. `processes/main.bpmn20.xml`
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileContent {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Guess the content type from the file extension.
    pub fn from_path(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let content_type = if filename.ends_with(".json") {
            CONTENT_TYPE_JSON
        } else {
            CONTENT_TYPE_XML
        };
        Self::new(filename, content_type, bytes)
    }

    /// Last path segment of the bundle path
    pub fn base_name(&self) -> &str {
        self.filename.rsplit('/').next().unwrap_or(&self.filename)
    }

    /// First path segment when the file lives inside a folder
    pub fn folder(&self) -> Option<&str> {
        let trimmed = self.filename.trim_start_matches('/');
        trimmed.split_once('/').map(|(folder, _)| folder)
    }
}

/// An unpacked project archive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectBundle {
    pub name: String,
    pub files: Vec<FileContent>,
}

impl ProjectBundle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
        }
    }

    pub fn find_file(&self, filename: &str) -> Option<&FileContent> {
        self.files.iter().find(|file| file.filename == filename)
    }
}
