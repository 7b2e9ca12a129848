use jsonschema::Validator;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::{decode_process_content, ContentError};
use crate::logic::flatten::{SchemaError, SchemaFlattener};
use crate::logic::resources::{ResourceLoader, MODEL_EXTENSIONS_SCHEMA, PROCESS_EXTENSIONS_SCHEMA};
use crate::model::{ModelType, PROCESS};

/// Maximum length of a DNS-style model name
pub const MAX_NAME_LENGTH: usize = 26;

static DNS_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])?$").expect("valid DNS name pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelValidationError {
    pub problem: String,
    pub description: String,
}

impl ModelValidationError {
    pub fn new(problem: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            problem: problem.into(),
            description: description.into(),
        }
    }
}

/// Validates model metadata (`extensions`) files against the built-in schemas.
///
/// Both schemas are flattened and compiled once, at construction.
pub struct ExtensionsValidator {
    process: Validator,
    model: Validator,
}

impl ExtensionsValidator {
    pub fn new(loader: &dyn ResourceLoader) -> Result<Self, SchemaError> {
        let mut flattener = SchemaFlattener::new(loader);
        let process = compile(PROCESS_EXTENSIONS_SCHEMA, flattener.flatten_resource(PROCESS_EXTENSIONS_SCHEMA)?)?;
        let model = compile(MODEL_EXTENSIONS_SCHEMA, flattener.flatten_resource(MODEL_EXTENSIONS_SCHEMA)?)?;
        Ok(Self { process, model })
    }

    /// Validate a metadata document; an empty list means valid
    pub fn validate(&self, model_type: &str, bytes: &[u8]) -> Result<Vec<ModelValidationError>, ContentError> {
        let document: Value = serde_json::from_slice(bytes)?;
        Ok(self.validate_value(model_type, &document))
    }

    pub fn validate_value(&self, model_type: &str, document: &Value) -> Vec<ModelValidationError> {
        let validator = if model_type == PROCESS {
            &self.process
        } else {
            &self.model
        };
        validator
            .iter_errors(document)
            .map(|error| {
                let path = error.instance_path.to_string();
                let location = if path.is_empty() { "#".to_string() } else { format!("#{}", path) };
                ModelValidationError::new(error.to_string(), format!("{}: {}", location, error))
            })
            .collect()
    }
}

impl std::fmt::Debug for ExtensionsValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionsValidator").finish_non_exhaustive()
    }
}

fn compile(name: &str, schema: Value) -> Result<Validator, SchemaError> {
    debug!("Compiling schema {}", name);
    jsonschema::validator_for(&schema).map_err(|error| SchemaError::Invalid {
        name: name.to_string(),
        message: error.to_string(),
    })
}

/// Validates the content of models by type
#[derive(Debug, Default, Clone)]
pub struct ContentValidator;

impl ContentValidator {
    pub fn new() -> Self {
        Self
    }

    /// Content of non-JSON types other than processes is not checked
    pub fn validate(&self, model_type: &ModelType, bytes: &[u8]) -> Vec<ModelValidationError> {
        if model_type.name == PROCESS {
            return match decode_process_content(bytes) {
                Ok(content) => {
                    let name = content
                        .as_ref()
                        .and_then(|content| content.main_process())
                        .and_then(|process| process.name.as_deref());
                    validate_dns_name(name, "process")
                }
                Err(error) => vec![ModelValidationError::new(
                    "Invalid process content",
                    error.to_string(),
                )],
            };
        }
        if !model_type.json {
            return Vec::new();
        }

        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(_)) => Vec::new(),
            Ok(_) => vec![ModelValidationError::new(
                "Invalid json content",
                ContentError::NotAnObject.to_string(),
            )],
            Err(error) => vec![ModelValidationError::new("Invalid json content", error.to_string())],
        }
    }
}

/// DNS-1035 style name check: lower case alphanumerics or '-', starting with
/// a letter and ending with an alphanumeric character.
pub fn validate_dns_name(name: Option<&str>, kind: &str) -> Vec<ModelValidationError> {
    let name = name.unwrap_or_default();
    let mut errors = Vec::new();
    if name.chars().count() > MAX_NAME_LENGTH {
        errors.push(ModelValidationError::new(
            format!("The {} name length cannot be greater than {}: '{}'", kind, MAX_NAME_LENGTH, name),
            format!("The {} name is too long", kind),
        ));
    }
    if !DNS_NAME.is_match(name) {
        errors.push(ModelValidationError::new(
            format!(
                "The {} name should follow DNS-1035 conventions: it must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character: '{}'",
                kind, name
            ),
            format!("The {} name is invalid", kind),
        ));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::bpmn::tests::MAIN_PROCESS;
    use crate::logic::resources::EmbeddedResourceLoader;
    use crate::model::{CONNECTOR, FORM};
    use serde_json::json;

    fn validator() -> ExtensionsValidator {
        ExtensionsValidator::new(&EmbeddedResourceLoader::with_builtin_schemas()).unwrap()
    }

    #[test]
    fn test_valid_process_extensions() {
        let document = json!({
            "id": "process-1",
            "name": "main",
            "type": "PROCESS",
            "extensions": {
                "properties": {
                    "v1": {"id": "v1", "name": "amount", "type": "integer", "value": 12},
                    "v2": {"id": "v2", "name": "when", "type": "date", "value": "2024-01-31"}
                },
                "mappings": {
                    "UserTask_1": {"inputs": {}, "mappingType": "MAP_ALL"}
                },
                "constants": {}
            }
        });
        assert!(validator().validate_value(PROCESS, &document).is_empty());
    }

    #[test]
    fn test_variable_value_must_match_its_type() {
        let document = json!({
            "name": "main",
            "extensions": {
                "properties": {
                    "v1": {"id": "v1", "name": "amount", "type": "integer", "value": "twelve"}
                }
            }
        });
        let errors = validator().validate_value(PROCESS, &document);
        assert!(!errors.is_empty());
        assert!(errors.iter().any(|e| e.description.contains("/extensions/properties/v1/value")));
    }

    #[test]
    fn test_model_schema_applies_to_other_types() {
        let validator = validator();
        assert!(!validator.validate_value(FORM, &json!({"description": "no name"})).is_empty());
        assert!(validator.validate_value(CONNECTOR, &json!({"name": "rest"})).is_empty());
        // process specific rules do not apply to other types
        let unknown_mapping = json!({"name": "f", "extensions": {"mappings": {"a": {"other": 1}}}});
        assert!(validator.validate_value(FORM, &unknown_mapping).is_empty());
        assert!(!validator.validate_value(PROCESS, &unknown_mapping).is_empty());
    }

    #[test]
    fn test_non_json_extensions_are_a_content_error() {
        assert!(validator().validate(PROCESS, b"not json").is_err());
    }

    #[test]
    fn test_dns_names() {
        assert!(validate_dns_name(Some("my-process-1"), "process").is_empty());
        assert_eq!(validate_dns_name(Some("NameWithUppercase"), "process").len(), 1);
        assert_eq!(validate_dns_name(Some("name_with_underscore"), "process").len(), 1);
        assert_eq!(validate_dns_name(Some("ends-with-"), "process").len(), 1);
        assert_eq!(validate_dns_name(None, "process").len(), 1);
        assert_eq!(validate_dns_name(Some("123456789_123456789_1234567"), "process").len(), 2);
    }

    #[test]
    fn test_process_content_name_is_validated() {
        let validator = ContentValidator::new();
        let process = ModelType::process();
        // the main process of the fixture is named "main-process"
        assert!(validator.validate(&process, MAIN_PROCESS.as_bytes()).is_empty());

        let invalid = MAIN_PROCESS.replace("name=\"main-process\"", "name=\"Main Process\"");
        assert_eq!(validator.validate(&process, invalid.as_bytes()).len(), 1);
        assert_eq!(validator.validate(&process, b"<definitions id=\"x\"></definitions>").len(), 1);
    }

    #[test]
    fn test_json_content_must_be_an_object() {
        let validator = ContentValidator::new();
        let form = ModelType::json(FORM, "forms");
        assert!(validator.validate(&form, br#"{"formRepresentation":{}}"#).is_empty());
        assert_eq!(validator.validate(&form, b"[]").len(), 1);
        assert_eq!(validator.validate(&ModelType::json(CONNECTOR, "connectors"), b"{").len(), 1);
        // decision tables are XML and have no content rule
        assert!(validator.validate(&ModelType::decision(), b"<definitions/>").is_empty());
    }
}
