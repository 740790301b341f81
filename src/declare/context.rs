//! Declarative job construction.
//!
//! Tasks are declared as [`TaskDef`]s into a [`JobContext`] during a
//! collection phase, then materialized into a [`Job`] in one step. The
//! context owns the pending definitions; nothing is global.

use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gateway::{Gateway, JobId};
use crate::model::{
    ContainerRuntime, FlowBlock, FlowScript, Job, LanguageRegistry, Script, ScriptLanguage,
    ScriptSource, Task,
};
use crate::{tlog, tlog_debug, tlog_warn};

/// Produces a task's implementation text when the job is materialized.
pub type Procedure = Box<dyn Fn() -> String + Send + Sync>;

/// Where a declared task's implementation comes from.
pub enum TaskBody {
    Source(ScriptSource),
    /// Called once per materialization.
    Procedure(Procedure),
}

impl std::fmt::Debug for TaskBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskBody::Source(source) => f.debug_tuple("Source").field(source).finish(),
            TaskBody::Procedure(_) => write!(f, "Procedure(..)"),
        }
    }
}

/// Part a declared task plays in loop, replicate or branch control.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FlowRole {
    #[default]
    Plain,
    /// Opens a replicated block; `script` yields the copy count.
    ReplicateStart { script: Script },
    ReplicateEnd,
    LoopStart,
    /// Closes a loop; `script` yields whether to loop again. Without an
    /// explicit target the innermost open `LoopStart` is used.
    LoopEnd {
        script: Script,
        target: Option<String>,
    },
    Branch {
        script: Script,
        if_target: String,
        else_target: String,
        continuation: String,
    },
}

/// One declared task, collected until the context is materialized.
#[derive(Debug)]
pub struct TaskDef {
    pub name: String,
    /// Language token; the context default applies when `None`.
    pub language: Option<String>,
    pub body: TaskBody,
    pub depends_on: Vec<String>,
    pub runtime: Option<ContainerRuntime>,
    pub input_files: Vec<String>,
    pub output_files: Vec<String>,
    pub variables: Vec<(String, String)>,
    pub generic_information: Vec<(String, String)>,
    pub precious_result: bool,
    pub role: FlowRole,
}

impl TaskDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: None,
            body: TaskBody::Source(ScriptSource::default()),
            depends_on: Vec::new(),
            runtime: None,
            input_files: Vec::new(),
            output_files: Vec::new(),
            variables: Vec::new(),
            generic_information: Vec::new(),
            precious_result: false,
            role: FlowRole::Plain,
        }
    }

    /// A task whose implementation is produced by `procedure`.
    pub fn procedure<F>(name: impl Into<String>, procedure: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self::new(name).body(TaskBody::Procedure(Box::new(procedure)))
    }

    pub fn language(mut self, token: impl Into<String>) -> Self {
        self.language = Some(token.into());
        self
    }

    pub fn body(mut self, body: TaskBody) -> Self {
        self.body = body;
        self
    }

    pub fn inline(self, text: impl Into<String>) -> Self {
        self.body(TaskBody::Source(ScriptSource::Inline(text.into())))
    }

    pub fn url(self, url: impl Into<String>) -> Self {
        self.body(TaskBody::Source(ScriptSource::Remote(url.into())))
    }

    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn runtime(mut self, runtime: ContainerRuntime) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn input_file(mut self, pattern: impl Into<String>) -> Self {
        self.input_files.push(pattern.into());
        self
    }

    pub fn output_file(mut self, pattern: impl Into<String>) -> Self {
        self.output_files.push(pattern.into());
        self
    }

    pub fn variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.push((key.into(), value.into()));
        self
    }

    pub fn generic_information(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.generic_information.push((key.into(), value.into()));
        self
    }

    pub fn precious(mut self) -> Self {
        self.precious_result = true;
        self
    }

    pub fn role(mut self, role: FlowRole) -> Self {
        self.role = role;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextState {
    #[default]
    Idle,
    Collecting,
    Materializing,
}

impl std::fmt::Display for ContextState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextState::Idle => write!(f, "idle"),
            ContextState::Collecting => write!(f, "collecting"),
            ContextState::Materializing => write!(f, "materializing"),
        }
    }
}

/// What `JobContext::run` does after submitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Wait for the job to end.
    pub wait: bool,
    /// Collect and print task output once the job ends. Implies `wait`.
    pub print_output: bool,
    /// Bound on the wait; the gateway's configured timeout when `None`.
    pub timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            wait: true,
            print_output: true,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub job_id: JobId,
    /// Task output, when it was collected.
    pub output: Option<String>,
}

/// Collects task definitions for one job at a time.
///
/// State moves `Idle -> Collecting -> Materializing -> Idle`. Leaving
/// `Materializing` always empties the collection, whether or not the
/// job could be built.
#[derive(Debug)]
pub struct JobContext {
    state: ContextState,
    job_name: String,
    defs: Vec<TaskDef>,
    registry: LanguageRegistry,
    default_language: ScriptLanguage,
}

impl Default for JobContext {
    fn default() -> Self {
        Self::new()
    }
}

impl JobContext {
    pub fn new() -> Self {
        Self {
            state: ContextState::Idle,
            job_name: String::new(),
            defs: Vec::new(),
            registry: LanguageRegistry::default(),
            default_language: ScriptLanguage::python(),
        }
    }

    /// Context whose undeclared languages fall back to
    /// `config.default_language`.
    pub fn with_config(config: &Config) -> Result<Self> {
        let mut context = Self::new();
        context.default_language = context.registry.language(&config.default_language)?;
        Ok(context)
    }

    /// Replace the registry used to resolve language tokens.
    pub fn with_registry(mut self, registry: LanguageRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn pending(&self) -> usize {
        self.defs.len()
    }

    fn transition(&mut self, from: ContextState, to: ContextState) -> Result<()> {
        if self.state != from {
            return Err(Error::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        tlog_debug!("JobContext: {} -> {}", from, to);
        self.state = to;
        Ok(())
    }

    /// Start collecting definitions for the job `name`.
    pub fn begin(&mut self, name: impl Into<String>) -> Result<()> {
        self.transition(ContextState::Idle, ContextState::Collecting)?;
        self.job_name = name.into();
        Ok(())
    }

    pub fn define(&mut self, def: TaskDef) -> Result<()> {
        if self.state != ContextState::Collecting {
            return Err(Error::InvalidTransition {
                from: self.state.to_string(),
                to: ContextState::Collecting.to_string(),
            });
        }
        tlog_debug!("JobContext: defined task {}", def.name);
        self.defs.push(def);
        Ok(())
    }

    /// Drop pending definitions and return to `Idle`.
    pub fn abort(&mut self) {
        if !self.defs.is_empty() {
            tlog_warn!(
                "JobContext: discarding {} pending task(s) of {}",
                self.defs.len(),
                self.job_name
            );
        }
        self.defs.clear();
        self.state = ContextState::Idle;
    }

    /// Build the job from the collected definitions.
    ///
    /// An undeclared dependency name is an `UnresolvedDependency` error.
    pub fn materialize(&mut self) -> Result<Job> {
        self.transition(ContextState::Collecting, ContextState::Materializing)?;
        let defs = std::mem::take(&mut self.defs);
        let name = std::mem::take(&mut self.job_name);

        let built = self.build(name, defs);
        self.state = ContextState::Idle;
        tlog_debug!("JobContext: {} -> {}", ContextState::Materializing, self.state);
        built
    }

    /// Collect definitions with `declare`, then materialize.
    pub fn define_job<F>(&mut self, name: impl Into<String>, declare: F) -> Result<Job>
    where
        F: FnOnce(&mut JobContext) -> Result<()>,
    {
        self.begin(name)?;
        if let Err(e) = declare(self) {
            self.abort();
            return Err(e);
        }
        self.materialize()
    }

    /// Declare, materialize and submit a job, then optionally wait for it
    /// and print its output.
    pub async fn run<F>(
        &mut self,
        gateway: &Gateway,
        name: impl Into<String>,
        declare: F,
        options: RunOptions,
    ) -> Result<RunOutcome>
    where
        F: FnOnce(&mut JobContext) -> Result<()>,
    {
        let job = self.define_job(name, declare)?;
        let job_id = gateway.submit(&job).await?;
        tlog!("JobContext: job {} submitted with id {}", job.name, job_id);

        let timeout = options.timeout.unwrap_or_else(|| gateway.wait_timeout());
        let output = if options.print_output {
            let output = gateway.get_job_output(&job_id, timeout).await?;
            println!("Job output:\n{}", output);
            Some(output)
        } else {
            if options.wait {
                gateway.wait_for_job(&job_id, timeout).await?;
            }
            None
        };

        Ok(RunOutcome { job_id, output })
    }

    fn build(&self, name: String, defs: Vec<TaskDef>) -> Result<Job> {
        let mut job = Job::new(name);
        let mut loop_starts: Vec<String> = Vec::new();
        let mut replicate_depth: Vec<String> = Vec::new();

        for def in &defs {
            let language = match &def.language {
                Some(token) => self.registry.language(token)?,
                None => self.default_language.clone(),
            };
            let mut task = Task::new(def.name.clone(), language);

            match &def.body {
                TaskBody::Source(source) => task.implementation = source.clone(),
                TaskBody::Procedure(procedure) => task.set_implementation(procedure()),
            }
            if let Some(runtime) = &def.runtime {
                task.set_fork_environment(runtime.clone().into_fork_environment());
            }
            for pattern in &def.input_files {
                task.add_input_file(pattern.clone());
            }
            for pattern in &def.output_files {
                task.add_output_file(pattern.clone());
            }
            for (key, value) in &def.variables {
                task.add_variable(key.clone(), value.clone());
            }
            for (key, value) in &def.generic_information {
                task.add_generic_information(key.clone(), value.clone());
            }
            task.set_precious_result(def.precious_result);

            match &def.role {
                FlowRole::Plain => {}
                FlowRole::ReplicateStart { script } => {
                    task.set_flow_block(FlowBlock::Start);
                    task.set_flow_script(FlowScript::replicate(script.clone()));
                    replicate_depth.push(def.name.clone());
                }
                FlowRole::ReplicateEnd => {
                    if replicate_depth.pop().is_none() {
                        return Err(Error::InvalidBlockPairing(format!(
                            "replicate end {} has no open replicate start",
                            def.name
                        )));
                    }
                    task.set_flow_block(FlowBlock::End);
                }
                FlowRole::LoopStart => {
                    task.set_flow_block(FlowBlock::Start);
                    loop_starts.push(def.name.clone());
                }
                FlowRole::LoopEnd { script, target } => {
                    let target = match target {
                        Some(target) => {
                            loop_starts.retain(|start| start != target);
                            target.clone()
                        }
                        None => loop_starts.pop().ok_or_else(|| {
                            Error::InvalidBlockPairing(format!(
                                "loop end {} has no open loop start",
                                def.name
                            ))
                        })?,
                    };
                    task.set_flow_block(FlowBlock::End);
                    task.set_flow_script(FlowScript::loop_to(script.clone(), target));
                }
                FlowRole::Branch {
                    script,
                    if_target,
                    else_target,
                    continuation,
                } => {
                    task.set_flow_script(FlowScript::branch(
                        script.clone(),
                        if_target.clone(),
                        else_target.clone(),
                        continuation.clone(),
                    ));
                }
            }

            job.add_task(task);
        }

        if let Some(open) = loop_starts.first().or(replicate_depth.first()) {
            return Err(Error::InvalidBlockPairing(format!(
                "block started at {} is never closed",
                open
            )));
        }

        for def in &defs {
            for dependency in &def.depends_on {
                if !job.contains_task(dependency) {
                    return Err(Error::UnresolvedDependency {
                        task: def.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
                if let Some(task) = job.task_mut(&def.name) {
                    task.add_dependency(dependency.clone());
                }
            }
        }

        job.validate()?;
        tlog_debug!(
            "JobContext: materialized job {} with {} task(s)",
            job.name,
            job.task_count()
        );
        Ok(job)
    }
}
