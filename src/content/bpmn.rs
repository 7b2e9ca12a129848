//! BPMN 2.0 XML converter for process models.
//!
//! Decoding streams the document once and collects every process together
//! with the flow elements of the process and of its nested sub-processes.
//! Encoding replays the original document and only rewrites the attributes
//! whose value differs from the decoded content: process ids, `calledElement`
//! of call activities, `formKey` of user tasks and start events, and the
//! `bpmnElement` / `processRef` attributes that pointed at a renamed process.

use std::collections::HashMap;

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::content::{ContentConverter, ContentError, FlowElement, FlowElementKind, ModelContent, Process, ProcessContent};
use crate::model::PROCESS;

const SUB_PROCESS_ELEMENTS: &[&str] = &["subProcess", "adHocSubProcess", "transaction"];
const PROCESS_REFERENCE_ATTRIBUTES: &[&str] = &["bpmnElement", "processRef"];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Scope {
    Process,
    SubProcess,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Visit {
    Process,
    FlowElement,
    Other,
}

/// Tracks where the reader is in the element tree. Decoding and encoding
/// share it so both sides classify elements identically.
#[derive(Debug, Default)]
struct Cursor {
    scopes: Vec<Scope>,
}

impl Cursor {
    fn visit(&self, local: &str, has_id: bool) -> Visit {
        let in_process = self.scopes.contains(&Scope::Process);
        let in_container = matches!(self.scopes.last(), Some(Scope::Process | Scope::SubProcess));
        if local == "process" && !in_process {
            Visit::Process
        } else if in_container && has_id {
            Visit::FlowElement
        } else {
            Visit::Other
        }
    }

    fn enter(&mut self, local: &str, visit: Visit) {
        let scope = match visit {
            Visit::Process => Scope::Process,
            Visit::FlowElement if SUB_PROCESS_ELEMENTS.contains(&local) => Scope::SubProcess,
            _ => Scope::Other,
        };
        self.scopes.push(scope);
    }

    fn leave(&mut self) {
        self.scopes.pop();
    }
}

fn local_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// Attributes keyed by local name, namespace prefixes dropped
fn attributes(element: &BytesStart) -> Result<Vec<(String, String)>, ContentError> {
    let mut values = Vec::new();
    for attribute in element.attributes() {
        let attribute = attribute?;
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| ContentError::InvalidBpmn(e.to_string()))?
            .into_owned();
        values.push((key, value));
    }
    Ok(values)
}

fn find<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Decode BPMN XML bytes. Empty input yields no content.
pub fn decode_process_content(bytes: &[u8]) -> Result<Option<ProcessContent>, ContentError> {
    if bytes.is_empty() {
        return Ok(None);
    }

    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut cursor = Cursor::default();
    let mut processes: Vec<Process> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(element) => {
                let (local, visit) = record(&element, &cursor, &mut processes)?;
                cursor.enter(&local, visit);
            }
            Event::Empty(element) => {
                record(&element, &cursor, &mut processes)?;
            }
            Event::End(_) => cursor.leave(),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if processes.is_empty() {
        return Err(ContentError::NoProcess);
    }

    debug!(
        "Decoded BPMN model with {} process(es) and {} flow element(s)",
        processes.len(),
        processes.iter().map(|p| p.flow_elements.len()).sum::<usize>()
    );

    Ok(Some(ProcessContent::new(processes, bytes.to_vec())))
}

fn record(
    element: &BytesStart,
    cursor: &Cursor,
    processes: &mut Vec<Process>,
) -> Result<(String, Visit), ContentError> {
    let local = local_name(element);
    let attributes = attributes(element)?;
    let id = find(&attributes, "id");
    let visit = cursor.visit(&local, id.is_some());

    match visit {
        Visit::Process => {
            let name = find(&attributes, "name").map(str::to_string);
            processes.push(Process::new(id.unwrap_or_default(), name));
        }
        Visit::FlowElement => {
            if let Some(process) = processes.last_mut() {
                let kind = FlowElementKind::classify(&local, |name| {
                    find(&attributes, name).map(str::to_string)
                });
                process.flow_elements.push(FlowElement {
                    id: id.unwrap_or_default().to_string(),
                    kind,
                });
            }
        }
        Visit::Other => {}
    }

    Ok((local, visit))
}

/// Encode process content back to XML, rewriting changed identifiers in the
/// original document.
pub fn encode_process_content(content: &ProcessContent) -> Result<Vec<u8>, ContentError> {
    let renamed: HashMap<&str, &str> = content
        .processes
        .iter()
        .filter(|process| process.original_id != process.id && !process.original_id.is_empty())
        .map(|process| (process.original_id.as_str(), process.id.as_str()))
        .collect();

    let mut reader = Reader::from_reader(content.source.as_slice());
    let mut writer = Writer::new(Vec::with_capacity(content.source.len()));
    let mut buf = Vec::new();
    let mut rewriter = Rewriter {
        content,
        renamed,
        cursor: Cursor::default(),
        process_index: None,
        element_index: 0,
    };

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(element) => {
                let (local, visit, rewritten) = rewriter.rewrite(&element)?;
                rewriter.cursor.enter(&local, visit);
                match rewritten {
                    Some(rewritten) => write(&mut writer, Event::Start(rewritten))?,
                    None => write(&mut writer, Event::Start(element))?,
                }
            }
            Event::Empty(element) => {
                let (_, _, rewritten) = rewriter.rewrite(&element)?;
                match rewritten {
                    Some(rewritten) => write(&mut writer, Event::Empty(rewritten))?,
                    None => write(&mut writer, Event::Empty(element))?,
                }
            }
            Event::End(element) => {
                rewriter.cursor.leave();
                write(&mut writer, Event::End(element))?;
            }
            event => write(&mut writer, event)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event) -> Result<(), ContentError> {
    writer
        .write_event(event)
        .map_err(|e| ContentError::InvalidBpmn(e.to_string()))
}

struct Rewriter<'c> {
    content: &'c ProcessContent,
    renamed: HashMap<&'c str, &'c str>,
    cursor: Cursor,
    process_index: Option<usize>,
    element_index: usize,
}

impl<'c> Rewriter<'c> {
    /// Returns the rebuilt element when at least one attribute changed.
    fn rewrite(
        &mut self,
        element: &BytesStart,
    ) -> Result<(String, Visit, Option<BytesStart<'static>>), ContentError> {
        let content = self.content;
        let local = local_name(element);
        let current = attributes(element)?;
        let visit = self.cursor.visit(&local, find(&current, "id").is_some());

        let mut overrides: Vec<(&str, &str)> = Vec::new();
        match visit {
            Visit::Process => {
                let index = self.process_index.map_or(0, |index| index + 1);
                self.process_index = Some(index);
                self.element_index = 0;
                if let Some(process) = content.processes.get(index) {
                    overrides.push(("id", process.id.as_str()));
                }
            }
            Visit::FlowElement => {
                let element = self
                    .process_index
                    .and_then(|index| content.processes.get(index))
                    .and_then(|process| process.flow_elements.get(self.element_index));
                self.element_index += 1;
                match element.map(|element| &element.kind) {
                    Some(FlowElementKind::CallActivity {
                        called_element: Some(called_element),
                    }) => overrides.push(("calledElement", called_element.as_str())),
                    Some(FlowElementKind::UserTask { form_key: Some(form_key) })
                    | Some(FlowElementKind::StartEvent { form_key: Some(form_key) }) => {
                        overrides.push(("formKey", form_key.as_str()))
                    }
                    _ => {}
                }
            }
            Visit::Other => {}
        }

        for name in PROCESS_REFERENCE_ATTRIBUTES.iter().copied() {
            if let Some(new_id) = find(&current, name).and_then(|value| self.renamed.get(value).copied()) {
                overrides.push((name, new_id));
            }
        }

        let changed = overrides
            .iter()
            .any(|(name, value)| find(&current, name).is_some_and(|old| old != *value));
        if !changed {
            return Ok((local, visit, None));
        }

        let mut rebuilt = BytesStart::new(String::from_utf8_lossy(element.name().as_ref()).into_owned());
        for attribute in element.attributes() {
            let attribute = attribute?;
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            match overrides.iter().find(|(name, _)| *name == key) {
                Some((_, value)) => {
                    let escaped = quick_xml::escape::escape(*value);
                    rebuilt.push_attribute((attribute.key.as_ref(), escaped.as_bytes()));
                }
                None => rebuilt.push_attribute(attribute),
            }
        }

        Ok((local, visit, Some(rebuilt)))
    }
}

/// [`ContentConverter`] for process models stored as BPMN 2.0 XML
#[derive(Debug, Clone, Default)]
pub struct BpmnXmlConverter;

impl BpmnXmlConverter {
    pub fn new() -> Self {
        Self
    }
}

impl ContentConverter for BpmnXmlConverter {
    fn handled_model_type(&self) -> &str {
        PROCESS
    }

    fn decode(&self, bytes: &[u8]) -> Result<Option<ModelContent>, ContentError> {
        Ok(decode_process_content(bytes)?.map(ModelContent::Process))
    }

    fn encode(&self, content: &ModelContent) -> Result<Vec<u8>, ContentError> {
        match content {
            ModelContent::Process(process) => encode_process_content(process),
            ModelContent::Json(_) => Err(ContentError::UnexpectedContent {
                model_type: PROCESS.to_string(),
                found: "JSON",
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const MAIN_PROCESS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn2:definitions xmlns:bpmn2="http://www.omg.org/spec/BPMN/20100524/MODEL" xmlns:bpmndi="http://www.omg.org/spec/BPMN/20100524/DI" xmlns:activiti="http://activiti.org/bpmn" id="model-1" targetNamespace="http://bpmn.io/schema/bpmn">
  <bpmn2:process id="Process_main" name="main-process" isExecutable="true">
    <bpmn2:startEvent id="StartEvent_1" activiti:formKey="form-start"/>
    <bpmn2:userTask id="UserTask_1" name="Review" activiti:formKey="form-review"/>
    <bpmn2:callActivity id="CallActivity_1" calledElement="Process_sub"/>
    <bpmn2:subProcess id="SubProcess_1">
      <bpmn2:callActivity id="CallActivity_2" calledElement="Process_external"/>
    </bpmn2:subProcess>
    <bpmn2:sequenceFlow id="Flow_1" sourceRef="StartEvent_1" targetRef="UserTask_1"/>
  </bpmn2:process>
  <bpmndi:BPMNDiagram id="BPMNDiagram_1">
    <bpmndi:BPMNPlane id="BPMNPlane_1" bpmnElement="Process_main"/>
  </bpmndi:BPMNDiagram>
</bpmn2:definitions>"#;

    #[test]
    fn test_decode_collects_processes_and_flow_elements() {
        let content = decode_process_content(MAIN_PROCESS.as_bytes())
            .unwrap()
            .unwrap();

        assert_eq!(content.id(), Some("Process_main"));
        let process = content.main_process().unwrap();
        assert_eq!(process.name.as_deref(), Some("main-process"));

        let ids: Vec<&str> = process.flow_elements.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["StartEvent_1", "UserTask_1", "CallActivity_1", "SubProcess_1", "CallActivity_2", "Flow_1"]
        );
        assert_eq!(process.flow_elements[0].reference(), Some("form-start"));
        assert_eq!(process.flow_elements[1].reference(), Some("form-review"));
        assert_eq!(process.flow_elements[2].reference(), Some("Process_sub"));
        assert_eq!(process.flow_elements[4].reference(), Some("Process_external"));
        assert_eq!(process.flow_elements[5].reference(), None);
    }

    #[test]
    fn test_decode_empty_bytes_yields_nothing() {
        assert!(decode_process_content(&[]).unwrap().is_none());
    }

    #[test]
    fn test_decode_without_process_fails() {
        let result = decode_process_content(b"<definitions id=\"x\"></definitions>");
        assert!(matches!(result, Err(ContentError::NoProcess)));
    }

    #[test]
    fn test_decode_malformed_xml_fails() {
        let result = decode_process_content(b"<definitions><process id=\"a\"></definitions>");
        assert!(matches!(result, Err(ContentError::InvalidBpmn(_))));
    }

    #[test]
    fn test_encode_unchanged_content_is_identical() {
        let content = decode_process_content(MAIN_PROCESS.as_bytes())
            .unwrap()
            .unwrap();
        let bytes = encode_process_content(&content).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), MAIN_PROCESS);
    }

    #[test]
    fn test_encode_rewrites_changed_identifiers() {
        let mut content = decode_process_content(MAIN_PROCESS.as_bytes())
            .unwrap()
            .unwrap();
        let process = &mut content.processes[0];
        process.id = "process-1".to_string();
        process.flow_elements[1].kind = FlowElementKind::UserTask {
            form_key: Some("form-2".to_string()),
        };
        process.flow_elements[2].kind = FlowElementKind::CallActivity {
            called_element: Some("process-3".to_string()),
        };

        let xml = String::from_utf8(encode_process_content(&content).unwrap()).unwrap();
        assert!(xml.contains(r#"id="process-1""#));
        assert!(xml.contains(r#"activiti:formKey="form-2""#));
        assert!(xml.contains(r#"calledElement="process-3""#));
        assert!(xml.contains(r#"bpmnElement="process-1""#));
        assert!(xml.contains(r#"activiti:formKey="form-start""#));
        assert!(xml.contains(r#"calledElement="Process_external""#));
        assert!(!xml.contains("Process_main"));

        let decoded = decode_process_content(xml.as_bytes()).unwrap().unwrap();
        assert_eq!(decoded.id(), Some("process-1"));
    }
}
