use serde::{Deserialize, Serialize};

/// In-memory view of a BPMN document: its processes and their flow elements.
///
/// The original document is kept so that encoding only touches the
/// identifiers and references that were changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessContent {
    pub processes: Vec<Process>,
    pub(crate) source: Vec<u8>,
}

impl ProcessContent {
    pub fn new(processes: Vec<Process>, source: Vec<u8>) -> Self {
        Self { processes, source }
    }

    /// Id of the first process in the document
    pub fn id(&self) -> Option<&str> {
        self.processes.first().map(|process| process.id.as_str())
    }

    pub fn main_process(&self) -> Option<&Process> {
        self.processes.first()
    }

    pub fn process_by_id(&self, id: &str) -> Option<&Process> {
        self.processes.iter().find(|process| process.id == id)
    }

    /// All flow elements of all processes
    pub fn flow_elements(&self) -> impl Iterator<Item = &FlowElement> {
        self.processes
            .iter()
            .flat_map(|process| process.flow_elements.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: String,
    pub name: Option<String>,
    pub flow_elements: Vec<FlowElement>,
    /// Id the process had when the document was decoded
    #[serde(skip)]
    pub(crate) original_id: String,
}

impl Process {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        let id = id.into();
        Self {
            original_id: id.clone(),
            id,
            name,
            flow_elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: FlowElement) -> Self {
        self.flow_elements.push(element);
        self
    }

    pub fn original_id(&self) -> &str {
        &self.original_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowElement {
    pub id: String,
    pub kind: FlowElementKind,
}

impl FlowElement {
    pub fn call_activity(id: &str, called_element: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: FlowElementKind::CallActivity {
                called_element: Some(called_element.to_string()),
            },
        }
    }

    pub fn user_task(id: &str, form_key: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: FlowElementKind::UserTask {
                form_key: Some(form_key.to_string()),
            },
        }
    }

    pub fn start_event(id: &str, form_key: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: FlowElementKind::StartEvent {
                form_key: Some(form_key.to_string()),
            },
        }
    }

    pub fn other(id: &str, element: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: FlowElementKind::Other {
                element: element.to_string(),
            },
        }
    }

    /// The id of another model this element points at, if any
    pub fn reference(&self) -> Option<&str> {
        match &self.kind {
            FlowElementKind::CallActivity { called_element } => called_element.as_deref(),
            FlowElementKind::UserTask { form_key } | FlowElementKind::StartEvent { form_key } => {
                form_key.as_deref()
            }
            FlowElementKind::Other { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FlowElementKind {
    CallActivity { called_element: Option<String> },
    UserTask { form_key: Option<String> },
    StartEvent { form_key: Option<String> },
    /// Any other element, carrying its local XML name
    Other { element: String },
}

impl FlowElementKind {
    /// Classify an element by its local BPMN name and the attribute lookup.
    pub fn classify(element: &str, attribute: impl Fn(&str) -> Option<String>) -> Self {
        match element {
            "callActivity" => FlowElementKind::CallActivity {
                called_element: attribute("calledElement"),
            },
            "userTask" => FlowElementKind::UserTask {
                form_key: attribute("formKey"),
            },
            "startEvent" => FlowElementKind::StartEvent {
                form_key: attribute("formKey"),
            },
            other => FlowElementKind::Other {
                element: other.to_string(),
            },
        }
    }
}
