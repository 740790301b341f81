//! TOML job definition files.
//!
//! ```toml
//! name = "nightly"
//!
//! [[task]]
//! name = "Fetch"
//! language = "bash"
//! script = "curl -O https://example.com/data.csv"
//!
//! [[task]]
//! name = "Train"
//! script_url = "https://example.com/train.py"
//! depends_on = ["Fetch"]
//!
//! [task.flow]
//! role = "loop-end"
//! script = "loop = variables.get('PA_TASK_ITERATION') < 3"
//! target = "Fetch"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::declare::context::{FlowRole, JobContext, TaskDef};
use crate::error::{Error, Result};
use crate::model::{ContainerRuntime, Job, LanguageRegistry, Script};
use crate::tlog_debug;

/// Language of flow scripts that do not name one.
pub const DEFAULT_FLOW_LANGUAGE: &str = "javascript";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFile {
    pub name: String,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub generic_information: BTreeMap<String, String>,
    pub input_folder: Option<String>,
    pub output_folder: Option<String>,
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEntry {
    pub name: String,
    pub language: Option<String>,
    pub script: Option<String>,
    pub script_url: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub input_files: Vec<String>,
    #[serde(default)]
    pub output_files: Vec<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub generic_information: BTreeMap<String, String>,
    #[serde(default)]
    pub precious: bool,
    pub runtime: Option<ContainerRuntime>,
    pub flow: Option<FlowEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "kebab-case")]
pub enum FlowEntry {
    ReplicateStart {
        script: String,
        language: Option<String>,
    },
    ReplicateEnd,
    LoopStart,
    LoopEnd {
        script: String,
        language: Option<String>,
        target: Option<String>,
    },
    Branch {
        script: String,
        language: Option<String>,
        #[serde(rename = "if")]
        if_target: String,
        #[serde(rename = "else")]
        else_target: String,
        continuation: String,
    },
}

fn flow_script(
    registry: &LanguageRegistry,
    text: &str,
    language: &Option<String>,
) -> Result<Script> {
    let language = registry.language(language.as_deref().unwrap_or(DEFAULT_FLOW_LANGUAGE))?;
    Ok(Script::inline(language, text))
}

impl FlowEntry {
    fn to_role(&self, registry: &LanguageRegistry) -> Result<FlowRole> {
        Ok(match self {
            FlowEntry::ReplicateStart { script, language } => FlowRole::ReplicateStart {
                script: flow_script(registry, script, language)?,
            },
            FlowEntry::ReplicateEnd => FlowRole::ReplicateEnd,
            FlowEntry::LoopStart => FlowRole::LoopStart,
            FlowEntry::LoopEnd {
                script,
                language,
                target,
            } => FlowRole::LoopEnd {
                script: flow_script(registry, script, language)?,
                target: target.clone(),
            },
            FlowEntry::Branch {
                script,
                language,
                if_target,
                else_target,
                continuation,
            } => FlowRole::Branch {
                script: flow_script(registry, script, language)?,
                if_target: if_target.clone(),
                else_target: else_target.clone(),
                continuation: continuation.clone(),
            },
        })
    }
}

impl TaskEntry {
    fn to_def(&self, registry: &LanguageRegistry) -> Result<TaskDef> {
        let mut def = TaskDef::new(self.name.clone());
        def = match (&self.script, &self.script_url) {
            (Some(_), Some(_)) => {
                return Err(Error::ConflictingFields {
                    task: self.name.clone(),
                    fields: "script, script_url".to_string(),
                })
            }
            (Some(text), None) => def.inline(text.clone()),
            (None, Some(url)) => def.url(url.clone()),
            (None, None) => def,
        };
        if let Some(language) = &self.language {
            def = def.language(language.clone());
        }
        def = def.depends_on(self.depends_on.iter().cloned());
        for pattern in &self.input_files {
            def = def.input_file(pattern.clone());
        }
        for pattern in &self.output_files {
            def = def.output_file(pattern.clone());
        }
        for (key, value) in &self.variables {
            def = def.variable(key.clone(), value.clone());
        }
        for (key, value) in &self.generic_information {
            def = def.generic_information(key.clone(), value.clone());
        }
        if self.precious {
            def = def.precious();
        }
        if let Some(runtime) = &self.runtime {
            def = def.runtime(runtime.clone());
        }
        if let Some(flow) = &self.flow {
            def = def.role(flow.to_role(registry)?);
        }
        Ok(def)
    }
}

impl JobFile {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        tlog_debug!("JobFile::load path={}", path.display());
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Declare every task into `context` and materialize the job.
    pub fn into_job(self, context: &mut JobContext) -> Result<Job> {
        let JobFile {
            name,
            variables,
            generic_information,
            input_folder,
            output_folder,
            tasks,
        } = self;

        let mut job = context.define_job(name, |ctx| {
            for entry in &tasks {
                let def = entry.to_def(ctx.registry())?;
                ctx.define(def)?;
            }
            Ok(())
        })?;

        for (key, value) in variables {
            job.add_variable(key, value);
        }
        for (key, value) in generic_information {
            job.add_generic_information(key, value);
        }
        if let Some(folder) = input_folder {
            job.set_input_folder(folder);
        }
        if let Some(folder) = output_folder {
            job.set_output_folder(folder);
        }
        Ok(job)
    }
}
