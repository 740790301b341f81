//! Native job representation handed to the execution service.
//!
//! These types mirror the service's task-flow job document. Optional parts
//! are `Option`s skipped on serialization: the service treats presence as
//! opt-in, so an absent fork environment must stay absent.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::{FlowActionType, FlowBlock, Script, ScriptSource};

/// Script body: inline code or a URL, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeScript {
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl NativeScript {
    pub(crate) fn new(language: &str, source: &ScriptSource) -> Self {
        let (code, url) = match source {
            ScriptSource::Inline(text) => (Some(text.clone()), None),
            ScriptSource::Remote(url) => (None, Some(url.clone())),
        };
        Self {
            language: language.to_string(),
            code,
            url,
        }
    }
}

impl From<&Script> for NativeScript {
    fn from(script: &Script) -> Self {
        Self::new(script.language.as_str(), &script.source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeSelectionScript {
    #[serde(flatten)]
    pub script: NativeScript,
    #[serde(rename = "type")]
    pub kind: SelectionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionKind {
    Dynamic,
    Static,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeForkEnvironment {
    pub java_home: String,
    pub env_script: NativeScript,
}

/// Flow control wired onto a task, with its targets already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeFlowScript {
    pub action_type: FlowActionType,
    pub script: NativeScript,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_else: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_continuation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessMode {
    TransferFromInputSpace,
    TransferToOutputSpace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeFileSelector {
    pub includes: String,
    pub access_mode: AccessMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeTask {
    pub name: String,
    pub script: NativeScript,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fork_environment: Option<NativeForkEnvironment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_script: Option<NativeSelectionScript>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_script: Option<NativeScript>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_script: Option<NativeScript>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_flow: Option<NativeFlowScript>,
    #[serde(skip_serializing_if = "FlowBlock::is_none")]
    pub flow_block: FlowBlock,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub generic_information: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub input_files: Vec<NativeFileSelector>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output_files: Vec<NativeFileSelector>,
    /// Names of the tasks this one waits for.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
    pub precious_result: bool,
}

/// A fully linked job, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeJob {
    pub name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub generic_information: BTreeMap<String, String>,
    pub tasks: Vec<NativeTask>,
}

impl NativeJob {
    pub fn task(&self, name: &str) -> Option<&NativeTask> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Every dependency edge as `(upstream, downstream)`.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.tasks
            .iter()
            .flat_map(|t| t.depends.iter().map(move |dep| (dep.as_str(), t.name.as_str())))
            .collect()
    }

    /// Whether `to` waits for `from`.
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.task(to)
            .map(|t| t.depends.iter().any(|d| d == from))
            .unwrap_or(false)
    }

    /// Pretty JSON rendering of the job document.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
