pub mod bpmn;
pub mod error;
pub mod json;
pub mod process;

pub use bpmn::*;
pub use error::*;
pub use json::*;
pub use process::*;

use std::collections::HashMap;

use crate::model::{CONNECTOR, FORM};

/// Structured content of a model, as produced by a [`ContentConverter`]
#[derive(Debug, Clone, PartialEq)]
pub enum ModelContent {
    Process(ProcessContent),
    Json(JsonContent),
}

impl ModelContent {
    /// The identifier the content declares for itself
    pub fn id(&self) -> Option<&str> {
        match self {
            ModelContent::Process(process) => process.id(),
            ModelContent::Json(json) => json.id(),
        }
    }

    pub fn template(&self) -> Option<&str> {
        match self {
            ModelContent::Process(_) => None,
            ModelContent::Json(json) => json.template(),
        }
    }
}

/// Converts the raw bytes of one model type to structured content and back
pub trait ContentConverter: Send + Sync {
    fn handled_model_type(&self) -> &str;

    /// `Ok(None)` when there is no content to decode
    fn decode(&self, bytes: &[u8]) -> Result<Option<ModelContent>, ContentError>;

    fn encode(&self, content: &ModelContent) -> Result<Vec<u8>, ContentError>;
}

/// Content converters keyed by model type name
#[derive(Default)]
pub struct ConverterRegistry {
    converters: HashMap<String, Box<dyn ContentConverter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the converters for the built-in model types.
    /// Decision tables have no converter and pass through unchanged.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BpmnXmlConverter::new()));
        registry.register(Box::new(JsonContentConverter::with_envelope(FORM, FORM_ENVELOPE)));
        registry.register(Box::new(JsonContentConverter::generic(CONNECTOR)));
        registry
    }

    /// Register a converter under the model type it handles, replacing any
    /// previous one
    pub fn register(&mut self, converter: Box<dyn ContentConverter>) {
        self.converters
            .insert(converter.handled_model_type().to_string(), converter);
    }

    pub fn find(&self, model_type: &str) -> Option<&dyn ContentConverter> {
        self.converters.get(model_type).map(|converter| converter.as_ref())
    }

    /// Decode content with the converter of its model type, if any
    pub fn decode(&self, model_type: &str, bytes: &[u8]) -> Result<Option<ModelContent>, ContentError> {
        match self.find(model_type) {
            Some(converter) => converter.decode(bytes),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&String> = self.converters.keys().collect();
        types.sort();
        f.debug_struct("ConverterRegistry").field("model_types", &types).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DECISION, PROCESS};

    #[test]
    fn test_default_registry_covers_built_in_types() {
        let registry = ConverterRegistry::with_defaults();
        assert!(registry.find(PROCESS).is_some());
        assert!(registry.find(FORM).is_some());
        assert!(registry.find(CONNECTOR).is_some());
        assert!(registry.find(DECISION).is_none());
    }

    #[test]
    fn test_decode_without_converter_yields_nothing() {
        let registry = ConverterRegistry::with_defaults();
        assert!(registry.decode(DECISION, b"<definitions/>").unwrap().is_none());
    }
}
