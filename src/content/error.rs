use thiserror::Error;

/// Errors raised while decoding, rewriting or encoding a single model content.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("invalid JSON content: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("JSON content must be an object")]
    NotAnObject,

    #[error("missing '{0}' in model content")]
    MissingEnvelope(String),

    #[error("invalid BPMN model: {0}")]
    InvalidBpmn(String),

    #[error("invalid BPMN model: no process found")]
    NoProcess,

    #[error("converter for {model_type} cannot handle {found} content")]
    UnexpectedContent { model_type: String, found: &'static str },
}

impl From<quick_xml::Error> for ContentError {
    fn from(error: quick_xml::Error) -> Self {
        ContentError::InvalidBpmn(error.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ContentError {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        ContentError::InvalidBpmn(error.to_string())
    }
}
