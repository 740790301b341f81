//! Task node of a job graph.
//!
//! A task is a named unit of work: an implementation script plus optional
//! auxiliary scripts, variables, file lists and dependency references.
//! Dependencies are stored by name and resolved against the owning job at
//! compile time, so tasks never own or borrow one another.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::model::flow::FlowBlock;
use crate::model::language::ScriptLanguage;
use crate::model::script::{FlowScript, ForkEnvironment, Script, ScriptSource, SelectionScript};

/// A single task in a job graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Name, unique within the owning job.
    pub name: String,
    /// Language of the implementation.
    pub language: ScriptLanguage,
    /// The task's code, inline or by reference.
    pub implementation: ScriptSource,
    pub fork_environment: Option<ForkEnvironment>,
    pub selection_script: Option<SelectionScript>,
    pub pre_script: Option<Script>,
    pub post_script: Option<Script>,
    pub flow_script: Option<FlowScript>,
    pub flow_block: FlowBlock,
    pub variables: BTreeMap<String, String>,
    pub generic_information: BTreeMap<String, String>,
    /// Files transferred to the node before the task runs, in order.
    pub input_files: Vec<String>,
    /// Files transferred back once the task finishes, in order.
    pub output_files: Vec<String>,
    /// Names of tasks this one waits for. Kept in insertion order, no repeats.
    dependencies: Vec<String>,
    /// Result should be kept as a job-level result.
    pub precious_result: bool,
}

impl Task {
    /// Create a task with an empty inline implementation and no extras.
    pub fn new(name: impl Into<String>, language: ScriptLanguage) -> Self {
        Self {
            name: name.into(),
            language,
            implementation: ScriptSource::default(),
            fork_environment: None,
            selection_script: None,
            pre_script: None,
            post_script: None,
            flow_script: None,
            flow_block: FlowBlock::None,
            variables: BTreeMap::new(),
            generic_information: BTreeMap::new(),
            input_files: Vec::new(),
            output_files: Vec::new(),
            dependencies: Vec::new(),
            precious_result: false,
        }
    }

    /// Create a task validating `language` against the built-in registry.
    pub fn with_language_token(name: impl Into<String>, language: &str) -> Result<Self> {
        Ok(Self::new(name, ScriptLanguage::parse(language)?))
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Set inline source text, clearing any remote reference.
    pub fn set_implementation(&mut self, text: impl Into<String>) {
        self.implementation = ScriptSource::Inline(text.into());
    }

    /// Point at remote code, clearing any inline text.
    pub fn set_implementation_url(&mut self, url: impl Into<String>) {
        self.implementation = ScriptSource::Remote(url.into());
    }

    pub fn set_implementation_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.set_implementation(std::fs::read_to_string(path)?);
        Ok(())
    }

    pub fn set_fork_environment(&mut self, env: ForkEnvironment) {
        self.fork_environment = Some(env);
    }

    pub fn set_selection_script(&mut self, script: SelectionScript) {
        self.selection_script = Some(script);
    }

    pub fn set_pre_script(&mut self, script: Script) {
        self.pre_script = Some(script);
    }

    pub fn set_post_script(&mut self, script: Script) {
        self.post_script = Some(script);
    }

    pub fn set_flow_script(&mut self, script: FlowScript) {
        self.flow_script = Some(script);
    }

    pub fn set_flow_block(&mut self, block: FlowBlock) {
        self.flow_block = block;
    }

    /// Add a variable. An existing key is overwritten.
    pub fn add_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Add generic information. An existing key is overwritten.
    pub fn add_generic_information(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.generic_information.insert(key.into(), value.into());
    }

    pub fn add_input_file(&mut self, pattern: impl Into<String>) {
        self.input_files.push(pattern.into());
    }

    pub fn add_output_file(&mut self, pattern: impl Into<String>) {
        self.output_files.push(pattern.into());
    }

    /// Depend on the task called `name`. Adding the same name twice is a no-op.
    pub fn add_dependency(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.dependencies.contains(&name) {
            self.dependencies.push(name);
        }
    }

    /// Depend on `other` by name.
    pub fn depends_on(&mut self, other: &Task) {
        self.add_dependency(other.name.clone());
    }

    /// Returns `true` if the dependency was present.
    pub fn remove_dependency(&mut self, name: &str) -> bool {
        let before = self.dependencies.len();
        self.dependencies.retain(|dep| dep != name);
        before != self.dependencies.len()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn set_precious_result(&mut self, precious: bool) {
        self.precious_result = precious;
    }
}
