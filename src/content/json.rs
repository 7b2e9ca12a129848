use serde_json::Value;

use crate::content::{ContentConverter, ContentError, ModelContent};

/// Envelope key holding the form definition inside a form model
pub const FORM_ENVELOPE: &str = "formRepresentation";

/// Where the model id lives inside a JSON document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonIdLocation<'a> {
    TopLevel,
    Envelope(&'a str),
}

/// A parsed JSON model document
#[derive(Debug, Clone, PartialEq)]
pub struct JsonContent {
    pub document: Value,
    pub envelope: Option<String>,
}

impl JsonContent {
    pub fn parse(bytes: &[u8], envelope: Option<&str>) -> Result<Self, ContentError> {
        let document: Value = serde_json::from_slice(bytes)?;
        if !document.is_object() {
            return Err(ContentError::NotAnObject);
        }
        Ok(Self {
            document,
            envelope: envelope.map(str::to_string),
        })
    }

    pub fn location(&self) -> JsonIdLocation<'_> {
        match &self.envelope {
            Some(envelope) => JsonIdLocation::Envelope(envelope),
            None => JsonIdLocation::TopLevel,
        }
    }

    pub fn id(&self) -> Option<&str> {
        id_holder(&self.document, self.location())
            .ok()
            .and_then(|holder| holder.get("id"))
            .and_then(Value::as_str)
    }

    /// Connector templates are stored at the top level
    pub fn template(&self) -> Option<&str> {
        self.document.get("template").and_then(Value::as_str)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ContentError> {
        Ok(serde_json::to_vec(&self.document)?)
    }
}

/// The object carrying the `id` field for the given location.
pub(crate) fn id_holder<'v>(
    document: &'v Value,
    location: JsonIdLocation<'_>,
) -> Result<&'v serde_json::Map<String, Value>, ContentError> {
    let holder = match location {
        JsonIdLocation::TopLevel => Some(document),
        JsonIdLocation::Envelope(key) => document.get(key),
    };
    match (holder, location) {
        (Some(Value::Object(map)), _) => Ok(map),
        (_, JsonIdLocation::Envelope(key)) => Err(ContentError::MissingEnvelope(key.to_string())),
        (_, JsonIdLocation::TopLevel) => Err(ContentError::NotAnObject),
    }
}

pub(crate) fn id_holder_mut<'v>(
    document: &'v mut Value,
    location: JsonIdLocation<'_>,
) -> Result<&'v mut serde_json::Map<String, Value>, ContentError> {
    let holder = match location {
        JsonIdLocation::TopLevel => Some(document),
        JsonIdLocation::Envelope(key) => document.get_mut(key),
    };
    match holder {
        Some(Value::Object(map)) => Ok(map),
        _ => match location {
            JsonIdLocation::Envelope(key) => Err(ContentError::MissingEnvelope(key.to_string())),
            JsonIdLocation::TopLevel => Err(ContentError::NotAnObject),
        },
    }
}

/// [`ContentConverter`] for models whose content is a JSON document
#[derive(Debug, Clone)]
pub struct JsonContentConverter {
    model_type: String,
    envelope: Option<String>,
}

impl JsonContentConverter {
    /// Converter for a generic JSON model type, id at the top level
    pub fn generic(model_type: &str) -> Self {
        Self {
            model_type: model_type.to_string(),
            envelope: None,
        }
    }

    /// Converter for a JSON model type whose id sits under an envelope key
    pub fn with_envelope(model_type: &str, envelope: &str) -> Self {
        Self {
            model_type: model_type.to_string(),
            envelope: Some(envelope.to_string()),
        }
    }
}

impl ContentConverter for JsonContentConverter {
    fn handled_model_type(&self) -> &str {
        &self.model_type
    }

    fn decode(&self, bytes: &[u8]) -> Result<Option<ModelContent>, ContentError> {
        if bytes.is_empty() {
            return Ok(None);
        }
        JsonContent::parse(bytes, self.envelope.as_deref()).map(|content| Some(ModelContent::Json(content)))
    }

    fn encode(&self, content: &ModelContent) -> Result<Vec<u8>, ContentError> {
        match content {
            ModelContent::Json(json) => json.to_bytes(),
            ModelContent::Process(_) => Err(ContentError::UnexpectedContent {
                model_type: self.model_type.clone(),
                found: "BPMN",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FORM;
    use serde_json::json;

    #[test]
    fn test_form_id_is_read_from_envelope() {
        let bytes = serde_json::to_vec(&json!({
            "formRepresentation": { "id": "form-login", "name": "login" }
        }))
        .unwrap();
        let converter = JsonContentConverter::with_envelope(FORM, FORM_ENVELOPE);
        let content = converter.decode(&bytes).unwrap().unwrap();
        assert_eq!(content.id(), Some("form-login"));
    }

    #[test]
    fn test_generic_json_id_and_template() {
        let bytes = br#"{"id":"connector-1","name":"rest","template":"rest-template"}"#;
        let content = JsonContent::parse(bytes, None).unwrap();
        assert_eq!(content.id(), Some("connector-1"));
        assert_eq!(content.template(), Some("rest-template"));
    }

    #[test]
    fn test_non_object_documents_are_rejected() {
        assert!(matches!(
            JsonContent::parse(b"[1, 2]", None),
            Err(ContentError::NotAnObject)
        ));
        assert!(matches!(
            JsonContent::parse(b"{not json", None),
            Err(ContentError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_missing_envelope_is_reported() {
        let document = json!({ "id": "form-1" });
        assert!(matches!(
            id_holder(&document, JsonIdLocation::Envelope(FORM_ENVELOPE)),
            Err(ContentError::MissingEnvelope(key)) if key == FORM_ENVELOPE
        ));
    }
}
