//! Inlines external JSON-Schema resources referenced by `$ref` into the
//! `definitions` section of the root schema, so that the result can be
//! handed to a validator that knows nothing about the resource layout.

use std::collections::{BTreeMap, HashSet};

use log::debug;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::logic::resources::{ResourceError, ResourceLoader};

pub const DEFINITIONS: &str = "definitions";
const REF: &str = "$ref";
const CLASSPATH: &str = "classpath:";

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unable to resolve schema reference '{reference}': {source}")]
    UnresolvableReference {
        reference: String,
        #[source]
        source: ResourceError,
    },

    #[error("unsupported schema reference '{0}'")]
    UnsupportedReference(String),

    #[error("schema resource '{0}' is not a JSON object")]
    NotAnObject(String),

    #[error("'definitions' of the root schema is not an object")]
    InvalidDefinitions,

    #[error("invalid schema '{name}': {message}")]
    Invalid { name: String, message: String },

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// An external `$ref` target: the resource to load and an optional JSON
/// pointer inside it (starting with `/`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalReference {
    pub resource: String,
    pub pointer: Option<String>,
}

/// Split a `$ref` value into resource and pointer. In-document references
/// (`#...`) are not external references.
///
/// Accepted forms: `classpath://<path>`, `<path>/#/<pointer>`, `<path>#/<pointer>`
/// and a bare `<path>`. URIs of other schemes are returned with their scheme
/// kept in `resource`; the flattener rejects them.
pub fn parse_reference(value: &str) -> Option<ExternalReference> {
    if value.is_empty() || value.starts_with('#') {
        return None;
    }

    let (resource, pointer) = match value.find("#/") {
        Some(index) => (&value[..index], Some(value[index + 1..].to_string())),
        None => (value.strip_suffix('#').unwrap_or(value), None),
    };

    let resource = match resource.strip_prefix(CLASSPATH) {
        Some(path) => path.strip_prefix('/').unwrap_or(path),
        None => resource,
    };

    Some(ExternalReference {
        resource: resource.trim_end_matches('/').to_string(),
        pointer,
    })
}

/// Deterministic `definitions` key for a resource: `.json` suffix removed,
/// `/` and `-` replaced by `_`, any other character outside `[A-Za-z0-9_]`
/// dropped.
pub fn section_name(resource: &str) -> String {
    let stem = resource.strip_suffix(".json").unwrap_or(resource);
    stem.chars()
        .map(|c| if c == '/' || c == '-' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Flattens schemas using resources from a [`ResourceLoader`].
///
/// The section cache lives for one [`SchemaFlattener::flatten`] call; each
/// resource is loaded and flattened at most once per call. A failing
/// resource aborts the whole call.
pub struct SchemaFlattener<'l> {
    loader: &'l dyn ResourceLoader,
    sections: BTreeMap<String, Value>,
    in_progress: HashSet<String>,
}

impl<'l> SchemaFlattener<'l> {
    pub fn new(loader: &'l dyn ResourceLoader) -> Self {
        Self {
            loader,
            sections: BTreeMap::new(),
            in_progress: HashSet::new(),
        }
    }

    pub fn flatten(&mut self, schema: Value) -> Result<Value, SchemaError> {
        self.sections.clear();
        self.in_progress.clear();

        let mut schema = schema;
        self.walk(&mut schema)?;

        if self.sections.is_empty() {
            return Ok(schema);
        }

        let root = schema
            .as_object_mut()
            .ok_or_else(|| SchemaError::NotAnObject("<root>".to_string()))?;
        let definitions = root
            .entry(DEFINITIONS)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or(SchemaError::InvalidDefinitions)?;
        for (name, section) in std::mem::take(&mut self.sections) {
            definitions.insert(name, section);
        }

        Ok(schema)
    }

    /// Load and flatten a schema resource by name
    pub fn flatten_resource(&mut self, name: &str) -> Result<Value, SchemaError> {
        let schema = self.loader.load_json(name)?;
        self.flatten(schema)
    }

    fn walk(&mut self, value: &mut Value) -> Result<(), SchemaError> {
        match value {
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    if key == REF {
                        if let Value::String(reference) = child {
                            if let Some(rewritten) = self.resolve(reference)? {
                                *reference = rewritten;
                            }
                        }
                    } else {
                        self.walk(child)?;
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.walk(item)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn resolve(&mut self, reference: &str) -> Result<Option<String>, SchemaError> {
        let Some(external) = parse_reference(reference) else {
            return Ok(None);
        };
        // Only resources reachable through the loader can be inlined, and each
        // needs a non-empty section name.
        let section = section_name(&external.resource);
        if external.resource.contains("://")
            || external.resource.trim_start_matches('/').is_empty()
            || section.is_empty()
        {
            return Err(SchemaError::UnsupportedReference(reference.to_string()));
        }

        // A section still being flattened is referenced from inside itself
        // or one of its dependencies; it will be in place once the walk ends.
        if !self.sections.contains_key(&section) && !self.in_progress.contains(&section) {
            debug!("Inlining schema resource {} as {}", external.resource, section);
            let mut loaded = self
                .loader
                .load_json(&external.resource)
                .map_err(|source| SchemaError::UnresolvableReference {
                    reference: reference.to_string(),
                    source,
                })?;
            if !loaded.is_object() {
                return Err(SchemaError::NotAnObject(external.resource));
            }

            self.in_progress.insert(section.clone());
            let walked = self.walk(&mut loaded);
            self.in_progress.remove(&section);
            walked?;

            self.sections.insert(section.clone(), loaded);
        }

        Ok(Some(format!(
            "#/{}/{}{}",
            DEFINITIONS,
            section,
            external.pointer.unwrap_or_default()
        )))
    }
}
