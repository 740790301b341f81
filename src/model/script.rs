//! Script value objects attached to tasks.
//!
//! Every script is a language plus a [`ScriptSource`]. The specialised
//! kinds wrap a base [`Script`] and add only what they need: a dynamic
//! flag for selection predicates, a runtime home for fork environments,
//! and a [`FlowAction`] for flow scripts.

use std::path::Path;

use crate::error::Result;
use crate::model::flow::FlowActionType;
use crate::model::language::ScriptLanguage;

/// Where a script's code lives. Exactly one form is authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// Source text shipped inside the job.
    Inline(String),
    /// URL the execution service fetches the code from.
    Remote(String),
}

impl Default for ScriptSource {
    fn default() -> Self {
        ScriptSource::Inline(String::new())
    }
}

impl ScriptSource {
    pub fn is_empty(&self) -> bool {
        match self {
            ScriptSource::Inline(text) => text.trim().is_empty(),
            ScriptSource::Remote(url) => url.trim().is_empty(),
        }
    }

    pub fn inline_text(&self) -> Option<&str> {
        match self {
            ScriptSource::Inline(text) => Some(text),
            ScriptSource::Remote(_) => None,
        }
    }
}

/// Generic script: also used as-is for pre and post scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub language: ScriptLanguage,
    pub source: ScriptSource,
}

impl Script {
    /// An empty inline script in `language`.
    pub fn new(language: ScriptLanguage) -> Self {
        Self {
            language,
            source: ScriptSource::default(),
        }
    }

    pub fn inline(language: ScriptLanguage, text: impl Into<String>) -> Self {
        Self {
            language,
            source: ScriptSource::Inline(text.into()),
        }
    }

    pub fn remote(language: ScriptLanguage, url: impl Into<String>) -> Self {
        Self {
            language,
            source: ScriptSource::Remote(url.into()),
        }
    }

    /// Read inline source text from `path`.
    pub fn from_file(language: ScriptLanguage, path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::inline(language, std::fs::read_to_string(path)?))
    }

    /// Replace the source with inline text, dropping any remote reference.
    pub fn set_inline(&mut self, text: impl Into<String>) {
        self.source = ScriptSource::Inline(text.into());
    }

    /// Replace the source with a remote reference, dropping any inline text.
    pub fn set_remote(&mut self, url: impl Into<String>) {
        self.source = ScriptSource::Remote(url.into());
    }

    pub fn set_inline_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.set_inline(std::fs::read_to_string(path)?);
        Ok(())
    }
}

/// Worker-node predicate deciding where a task may run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionScript {
    pub script: Script,
    /// Re-evaluate on every scheduling attempt instead of caching the answer.
    pub dynamic: bool,
}

impl SelectionScript {
    /// Selection scripts are dynamic unless told otherwise.
    pub fn new(script: Script) -> Self {
        Self {
            script,
            dynamic: true,
        }
    }

    pub fn with_dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }
}

pub const DEFAULT_RUNTIME_HOME: &str = "/usr";

/// Isolated execution context (for example a container) for a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkEnvironment {
    pub script: Script,
    /// Home of the runtime used inside the environment.
    pub runtime_home: String,
}

impl ForkEnvironment {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            runtime_home: DEFAULT_RUNTIME_HOME.to_string(),
        }
    }

    pub fn with_runtime_home(mut self, home: impl Into<String>) -> Self {
        self.runtime_home = home.into();
        self
    }
}

/// What a flow script decides, with the task names it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowAction {
    Continue,
    /// The script yields the number of parallel copies of the block.
    Replicate,
    /// The script yields whether to re-enter the block at `target`.
    Loop { target: String },
    /// The script picks `target` or `else_target`; both join at `continuation`.
    If {
        target: String,
        else_target: String,
        continuation: String,
    },
}

impl FlowAction {
    pub fn action_type(&self) -> FlowActionType {
        match self {
            FlowAction::Continue => FlowActionType::Continue,
            FlowAction::Replicate => FlowActionType::Replicate,
            FlowAction::Loop { .. } => FlowActionType::Loop,
            FlowAction::If { .. } => FlowActionType::If,
        }
    }

    /// Every task name this action refers to.
    pub fn targets(&self) -> Vec<&str> {
        match self {
            FlowAction::Continue | FlowAction::Replicate => Vec::new(),
            FlowAction::Loop { target } => vec![target.as_str()],
            FlowAction::If {
                target,
                else_target,
                continuation,
            } => vec![target.as_str(), else_target.as_str(), continuation.as_str()],
        }
    }
}

/// Run-time-evaluated script controlling loops, replication or branching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowScript {
    pub script: Script,
    pub action: FlowAction,
}

impl FlowScript {
    pub fn continue_with(script: Script) -> Self {
        Self {
            script,
            action: FlowAction::Continue,
        }
    }

    pub fn replicate(script: Script) -> Self {
        Self {
            script,
            action: FlowAction::Replicate,
        }
    }

    pub fn loop_to(script: Script, target: impl Into<String>) -> Self {
        Self {
            script,
            action: FlowAction::Loop {
                target: target.into(),
            },
        }
    }

    pub fn branch(
        script: Script,
        target: impl Into<String>,
        else_target: impl Into<String>,
        continuation: impl Into<String>,
    ) -> Self {
        Self {
            script,
            action: FlowAction::If {
                target: target.into(),
                else_target: else_target.into(),
                continuation: continuation.into(),
            },
        }
    }

    pub fn action_type(&self) -> FlowActionType {
        self.action.action_type()
    }

    pub fn is_replicate(&self) -> bool {
        matches!(self.action, FlowAction::Replicate)
    }
}
