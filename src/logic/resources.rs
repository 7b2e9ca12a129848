use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

pub const MODEL_EXTENSIONS_SCHEMA: &str = "schema/model-extensions-schema.json";
pub const PROCESS_EXTENSIONS_SCHEMA: &str = "schema/process-extensions-schema.json";

const BUILTIN_SCHEMAS: &[(&str, &str)] = &[
    (
        MODEL_EXTENSIONS_SCHEMA,
        include_str!("../../schema/model-extensions-schema.json"),
    ),
    (
        PROCESS_EXTENSIONS_SCHEMA,
        include_str!("../../schema/process-extensions-schema.json"),
    ),
];

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource '{0}' not found")]
    NotFound(String),

    #[error("resource '{0}' is outside of the resource root")]
    OutsideRoot(String),

    #[error("failed to read resource '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("resource '{name}' is not valid JSON: {source}")]
    InvalidJson {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of external schema resources referenced by `$ref`
pub trait ResourceLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<Vec<u8>, ResourceError>;

    fn load_json(&self, name: &str) -> Result<Value, ResourceError> {
        let bytes = self.load(name)?;
        serde_json::from_slice(&bytes).map_err(|source| ResourceError::InvalidJson {
            name: name.to_string(),
            source,
        })
    }
}

impl<L: ResourceLoader + ?Sized> ResourceLoader for &L {
    fn load(&self, name: &str) -> Result<Vec<u8>, ResourceError> {
        (**self).load(name)
    }
}

impl<L: ResourceLoader + ?Sized> ResourceLoader for Box<L> {
    fn load(&self, name: &str) -> Result<Vec<u8>, ResourceError> {
        (**self).load(name)
    }
}

/// Resource names are relative to the loader root; leading `/` and `./` are ignored.
fn normalize(name: &str) -> &str {
    let mut name = name.trim_start_matches('/');
    while let Some(rest) = name.strip_prefix("./") {
        name = rest.trim_start_matches('/');
    }
    name
}

/// Loads resources from files below a root directory
#[derive(Debug, Clone)]
pub struct DirectoryResourceLoader {
    root: PathBuf,
}

impl DirectoryResourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceLoader for DirectoryResourceLoader {
    fn load(&self, name: &str) -> Result<Vec<u8>, ResourceError> {
        let relative = Path::new(normalize(name));
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return Err(ResourceError::OutsideRoot(name.to_string()));
        }

        std::fs::read(self.root.join(relative)).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ResourceError::NotFound(name.to_string())
            } else {
                ResourceError::Io {
                    name: name.to_string(),
                    source,
                }
            }
        })
    }
}

/// Resources held in memory, including the schemas compiled into the binary
#[derive(Debug, Clone, Default)]
pub struct EmbeddedResourceLoader {
    resources: HashMap<String, Vec<u8>>,
}

impl EmbeddedResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader serving the built-in model extension schemas
    pub fn with_builtin_schemas() -> Self {
        let mut loader = Self::new();
        for (name, content) in BUILTIN_SCHEMAS {
            loader.insert(name, content.as_bytes().to_vec());
        }
        loader
    }

    pub fn with_resource(mut self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(name, content.into());
        self
    }

    pub fn insert(&mut self, name: &str, content: Vec<u8>) {
        self.resources.insert(normalize(name).to_string(), content);
    }
}

impl ResourceLoader for EmbeddedResourceLoader {
    fn load(&self, name: &str) -> Result<Vec<u8>, ResourceError> {
        self.resources
            .get(normalize(name))
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_schemas_are_valid_json() {
        let loader = EmbeddedResourceLoader::with_builtin_schemas();
        for (name, _) in BUILTIN_SCHEMAS {
            assert!(loader.load_json(name).unwrap().is_object(), "{} should be an object", name);
        }
        // leading slashes as produced by classpath:// references
        assert!(loader.load("/schema/model-extensions-schema.json").is_ok());
    }

    #[test]
    fn test_missing_embedded_resource() {
        let loader = EmbeddedResourceLoader::new();
        assert!(matches!(loader.load("nothing.json"), Err(ResourceError::NotFound(_))));
    }

    #[test]
    fn test_directory_loader_reads_below_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("schema")).unwrap();
        std::fs::write(dir.path().join("schema/a.json"), br#"{"type":"string"}"#).unwrap();

        let loader = DirectoryResourceLoader::new(dir.path());
        assert_eq!(loader.load_json("/schema/a.json").unwrap()["type"], "string");
        assert!(matches!(loader.load("schema/b.json"), Err(ResourceError::NotFound(_))));
        assert!(matches!(loader.load("../secret.json"), Err(ResourceError::OutsideRoot(_))));
    }

    #[test]
    fn test_invalid_json_resource() {
        let loader = EmbeddedResourceLoader::new().with_resource("broken.json", "{");
        assert!(matches!(
            loader.load_json("broken.json"),
            Err(ResourceError::InvalidJson { .. })
        ));
    }
}
