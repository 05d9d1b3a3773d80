//! The serialized data model: Steps, Targets, variables and the Flow itself.
//!
//! A Flow is the replayable artifact a recording session produces. Steps keep
//! no DOM handles; everything an executor needs is carried by selectors.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::errors::Result;

fn is_false(b: &bool) -> bool {
    !*b
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Mints a step id: millisecond timestamp plus a random token.
pub fn mint_step_id() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("{}-{}", now_ms(), &token[..8])
}

/// A scroll position in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

/// How a candidate selector was derived, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Attr,
    Css,
    Aria,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "type")]
    pub kind: CandidateKind,
    pub value: String,
}

/// The addressable description of an element: a chosen primary selector plus
/// alternatives, and an opaque per-document `ref` used only while recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub selector: String,
    pub candidates: Vec<Candidate>,
    pub tag: String,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub elem_ref: Option<String>,
}

/// A fill value: text for inputs, a flag for checkboxes and radios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    Text(String),
    Flag(bool),
}

impl From<&str> for FillValue {
    fn from(s: &str) -> Self {
        FillValue::Text(s.to_string())
    }
}

impl From<String> for FillValue {
    fn from(s: String) -> Self {
        FillValue::Text(s)
    }
}

impl From<bool> for FillValue {
    fn from(b: bool) -> Self {
        FillValue::Flag(b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollMode {
    Offset,
    Container,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameTarget {
    #[serde(rename = "urlContains")]
    pub url_contains: String,
}

/// The action of a Step, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StepAction {
    Click {
        target: Target,
    },
    Dblclick {
        target: Target,
    },
    Fill {
        target: Target,
        value: FillValue,
    },
    Scroll {
        mode: ScrollMode,
        offset: Offset,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Target>,
    },
    Key {
        keys: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Target>,
    },
    OpenTab {
        url: String,
    },
    SwitchTab {
        #[serde(rename = "urlContains")]
        url_contains: String,
    },
    SwitchFrame {
        frame: FrameTarget,
    },
    WaitFor {
        target: Target,
    },
    Navigate {
        url: String,
    },
}

/// Post-step enrichments added by the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AfterHints {
    #[serde(default, skip_serializing_if = "is_false")]
    pub wait_for_navigation: bool,
}

/// One semantic user action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(flatten)]
    pub action: StepAction,
    #[serde(rename = "screenshotOnFail", default, skip_serializing_if = "is_false")]
    pub screenshot_on_fail: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<AfterHints>,
}

impl Step {
    pub fn new(action: StepAction) -> Self {
        Step {
            id: mint_step_id(),
            action,
            screenshot_on_fail: false,
            after: None,
        }
    }

    pub fn target(&self) -> Option<&Target> {
        match &self.action {
            StepAction::Click { target }
            | StepAction::Dblclick { target }
            | StepAction::Fill { target, .. }
            | StepAction::WaitFor { target } => Some(target),
            StepAction::Scroll { target, .. } => target.as_ref(),
            StepAction::Key { target, .. } => target.as_ref(),
            _ => None,
        }
    }

    pub fn target_mut(&mut self) -> Option<&mut Target> {
        match &mut self.action {
            StepAction::Click { target }
            | StepAction::Dblclick { target }
            | StepAction::Fill { target, .. }
            | StepAction::WaitFor { target } => Some(target),
            StepAction::Scroll { target, .. } => target.as_mut(),
            StepAction::Key { target, .. } => target.as_mut(),
            _ => None,
        }
    }

    /// Short label for display surfaces.
    pub fn type_name(&self) -> &'static str {
        match &self.action {
            StepAction::Click { .. } => "click",
            StepAction::Dblclick { .. } => "dblclick",
            StepAction::Fill { .. } => "fill",
            StepAction::Scroll { .. } => "scroll",
            StepAction::Key { .. } => "key",
            StepAction::OpenTab { .. } => "openTab",
            StepAction::SwitchTab { .. } => "switchTab",
            StepAction::SwitchFrame { .. } => "switchFrame",
            StepAction::WaitFor { .. } => "waitFor",
            StepAction::Navigate { .. } => "navigate",
        }
    }
}

/// A variable captured from a sensitive or file input. The step holding it
/// carries a `{key}` placeholder instead of the literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    pub key: String,
    pub sensitive: bool,
    pub default: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowMeta {
    pub created_at: u64,
    pub updated_at: u64,
}

/// An ordered script of Steps plus variable definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    pub name: String,
    pub version: u32,
    pub steps: Vec<Step>,
    pub variables: Vec<VariableDef>,
    pub meta: FlowMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Flow {
    pub fn new(id: Option<String>, name: Option<String>, description: Option<String>) -> Self {
        let now = now_ms();
        Flow {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: name.unwrap_or_else(|| "Recorded flow".to_string()),
            version: 1,
            steps: Vec::new(),
            variables: Vec::new(),
            meta: FlowMeta {
                created_at: now,
                updated_at: now,
            },
            description,
        }
    }

    /// Upserts steps by id: known ids replace in place (original position
    /// preserved), unknown ids append. Steps arriving without an id get one.
    pub fn append_steps(&mut self, incoming: Vec<Step>) {
        let mut index: std::collections::HashMap<String, usize> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        for mut step in incoming {
            if step.id.is_empty() {
                step.id = mint_step_id();
            }
            match index.get(&step.id) {
                Some(&i) => self.steps[i] = step,
                None => {
                    index.insert(step.id.clone(), self.steps.len());
                    self.steps.push(step);
                }
            }
        }
        self.meta.updated_at = now_ms();
    }

    /// Deduplicates by key; later definitions overwrite earlier ones. Entries
    /// with an empty key are skipped.
    pub fn append_variables(&mut self, incoming: Vec<VariableDef>) {
        for var in incoming {
            if var.key.is_empty() {
                continue;
            }
            match self.variables.iter_mut().find(|v| v.key == var.key) {
                Some(existing) => *existing = var,
                None => self.variables.push(var),
            }
        }
        self.meta.updated_at = now_ms();
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Flow> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
            .map_err(|e| crate::errors::RecorderError::Storage(e.to_string()))
    }

    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Flow> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| crate::errors::RecorderError::Storage(e.to_string()))?;
        Self::from_json(&json)
    }
}
