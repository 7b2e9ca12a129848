//! Rewrites the identifiers of imported model contents, and their references
//! to sibling models, to the identities assigned during import.

use log::debug;

use crate::content::{
    id_holder_mut, ContentError, ConverterRegistry, FlowElementKind, JsonContent, JsonIdLocation,
    ModelContent, ProcessContent, FORM_ENVELOPE,
};
use crate::logic::IdentifierMap;
use crate::model::{FORM, PROCESS};

/// Replace `value` with its mapped identifier; returns whether it changed.
fn remap(value: &mut String, identifiers: &IdentifierMap) -> bool {
    match identifiers.get(value.as_str()) {
        Some(new_id) if new_id != value.as_str() => {
            *value = new_id.to_string();
            true
        }
        _ => false,
    }
}

fn remap_optional(value: &mut Option<String>, identifiers: &IdentifierMap) -> bool {
    value
        .as_mut()
        .is_some_and(|value| remap(value, identifiers))
}

/// Rewrite process ids, call activity targets and form keys. References with
/// no entry in the map are left untouched. Returns the number of rewrites.
pub fn reconcile_process_content(content: &mut ProcessContent, identifiers: &IdentifierMap) -> usize {
    let mut rewritten = 0;
    for process in &mut content.processes {
        if remap(&mut process.id, identifiers) {
            rewritten += 1;
        }
        for element in &mut process.flow_elements {
            let changed = match &mut element.kind {
                FlowElementKind::CallActivity { called_element } => {
                    remap_optional(called_element, identifiers)
                }
                FlowElementKind::UserTask { form_key } | FlowElementKind::StartEvent { form_key } => {
                    remap_optional(form_key, identifiers)
                }
                FlowElementKind::Other { .. } => false,
            };
            if changed {
                rewritten += 1;
            }
        }
    }
    rewritten
}

/// Rewrite the `id` field of a parsed JSON model. Only that field is
/// considered; the rest of the document is not walked.
pub fn reconcile_json_content(content: &mut JsonContent, identifiers: &IdentifierMap) -> Result<bool, ContentError> {
    let location = match &content.envelope {
        Some(envelope) => JsonIdLocation::Envelope(envelope.as_str()),
        None => JsonIdLocation::TopLevel,
    };
    rewrite_json_id(&mut content.document, location, identifiers)
}

fn rewrite_json_id(
    document: &mut serde_json::Value,
    location: JsonIdLocation<'_>,
    identifiers: &IdentifierMap,
) -> Result<bool, ContentError> {
    let holder = id_holder_mut(document, location)?;
    let new_id = holder
        .get("id")
        .and_then(serde_json::Value::as_str)
        .and_then(|id| identifiers.get(id).filter(|new_id| *new_id != id));
    match new_id {
        Some(new_id) => {
            holder.insert("id".to_string(), serde_json::Value::String(new_id.to_string()));
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Parse `bytes` as JSON and rewrite the id found at `location`. The input is
/// returned byte for byte when no id changes; otherwise the document is
/// serialized again with its key order kept.
pub fn reconcile_generic_json_content(
    bytes: &[u8],
    location: JsonIdLocation<'_>,
    identifiers: &IdentifierMap,
) -> Result<Vec<u8>, ContentError> {
    let mut document: serde_json::Value = serde_json::from_slice(bytes)?;
    if !document.is_object() {
        return Err(ContentError::NotAnObject);
    }
    if !rewrite_json_id(&mut document, location, identifiers)? {
        return Ok(bytes.to_vec());
    }
    Ok(serde_json::to_vec(&document)?)
}

pub fn reconcile_model_content(content: &mut ModelContent, identifiers: &IdentifierMap) -> Result<(), ContentError> {
    match content {
        ModelContent::Process(process) => {
            reconcile_process_content(process, identifiers);
        }
        ModelContent::Json(json) => {
            reconcile_json_content(json, identifiers)?;
        }
    }
    Ok(())
}

/// Reconcile raw model content according to its model type. Content of a
/// type without a registered converter, and empty content, is returned as is.
pub fn reconcile_by_model_type(
    registry: &ConverterRegistry,
    model_type: &str,
    raw: &[u8],
    identifiers: &IdentifierMap,
) -> Result<Vec<u8>, ContentError> {
    let Some(converter) = registry.find(model_type) else {
        debug!("No content converter for model type {}, content kept as is", model_type);
        return Ok(raw.to_vec());
    };
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    match model_type {
        PROCESS => match converter.decode(raw)? {
            Some(mut content) => {
                reconcile_model_content(&mut content, identifiers)?;
                converter.encode(&content)
            }
            None => Ok(raw.to_vec()),
        },
        FORM => reconcile_generic_json_content(raw, JsonIdLocation::Envelope(FORM_ENVELOPE), identifiers),
        _ => reconcile_generic_json_content(raw, JsonIdLocation::TopLevel, identifiers),
    }
}
