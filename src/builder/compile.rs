//! Two-pass compiler from a [`Job`] graph to a [`NativeJob`].
//!
//! Pass 1 creates one native task per model task, in insertion order,
//! copying only the optional parts that are present. Pass 2 resolves every
//! dependency and flow target by name against the tasks built in pass 1
//! and wires the edges. A dependency may name a task declared later, which
//! is why wiring cannot happen during pass 1.
//!
//! Compilation is pure: it reads the job, allocates a fresh native job and
//! either returns it fully linked or fails without side effects.

use std::collections::HashMap;

use crate::builder::graph::DependencyGraph;
use crate::builder::native::{
    AccessMode, NativeFileSelector, NativeFlowScript, NativeForkEnvironment, NativeJob,
    NativeScript, NativeSelectionScript, NativeTask, SelectionKind,
};
use crate::error::{Error, Result};
use crate::model::{FlowAction, FlowBlock, Job, Task};
use crate::{tlog_debug, tlog_trace};

/// Stateless job compiler. Safe to share or to run concurrently on
/// independent jobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Builder;

impl Builder {
    pub fn new() -> Self {
        Self
    }

    pub fn compile(&self, job: &Job) -> Result<NativeJob> {
        job.validate()?;

        // Pass 1: instantiate.
        let mut tasks: Vec<NativeTask> = job.tasks().iter().map(instantiate).collect();
        let by_name: HashMap<&str, usize> = job
            .tasks()
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.as_str(), i))
            .collect();

        // Pass 2: wire dependencies, then flow targets (loop checks need the
        // complete dependency graph).
        let mut graph = DependencyGraph::new();
        for task in job.tasks() {
            graph.add_task(&task.name);
        }
        for (i, task) in job.tasks().iter().enumerate() {
            for dep in task.dependencies() {
                let upstream = by_name
                    .get(dep.as_str())
                    .ok_or_else(|| Error::UnresolvedDependency {
                        task: task.name.clone(),
                        dependency: dep.clone(),
                    })?;
                graph.add_dependency(&job.tasks()[*upstream].name, &task.name)?;
                tlog_trace!("Builder: {} -> {}", dep, task.name);
                tasks[i].depends.push(dep.clone());
            }
        }
        for (i, task) in job.tasks().iter().enumerate() {
            if let Some(flow) = wire_flow(job, task, &by_name, &graph)? {
                tasks[i].control_flow = Some(flow);
            }
        }

        tlog_debug!(
            "Builder: compiled job {} ({} tasks, {} dependencies, order: {})",
            job.name,
            graph.task_count(),
            graph.dependency_count(),
            graph.topological_order()?.join(", ")
        );

        Ok(NativeJob {
            name: job.name.clone(),
            variables: job.variables.clone(),
            generic_information: job.generic_information.clone(),
            tasks,
        })
    }
}

/// Compile `job` with a default [`Builder`].
pub fn compile(job: &Job) -> Result<NativeJob> {
    Builder::new().compile(job)
}

fn instantiate(task: &Task) -> NativeTask {
    NativeTask {
        name: task.name.clone(),
        script: NativeScript::new(task.language.as_str(), &task.implementation),
        fork_environment: task.fork_environment.as_ref().map(|env| NativeForkEnvironment {
            java_home: env.runtime_home.clone(),
            env_script: NativeScript::from(&env.script),
        }),
        selection_script: task.selection_script.as_ref().map(|sel| NativeSelectionScript {
            script: NativeScript::from(&sel.script),
            kind: if sel.dynamic {
                SelectionKind::Dynamic
            } else {
                SelectionKind::Static
            },
        }),
        pre_script: task.pre_script.as_ref().map(NativeScript::from),
        post_script: task.post_script.as_ref().map(NativeScript::from),
        control_flow: None,
        flow_block: task.flow_block,
        variables: task.variables.clone(),
        generic_information: task.generic_information.clone(),
        input_files: selectors(&task.input_files, AccessMode::TransferFromInputSpace),
        output_files: selectors(&task.output_files, AccessMode::TransferToOutputSpace),
        depends: Vec::new(),
        precious_result: task.precious_result,
    }
}

fn selectors(patterns: &[String], access_mode: AccessMode) -> Vec<NativeFileSelector> {
    patterns
        .iter()
        .map(|p| NativeFileSelector {
            includes: p.clone(),
            access_mode,
        })
        .collect()
}

fn resolve<'a>(
    task: &Task,
    target: &'a str,
    by_name: &HashMap<&str, usize>,
) -> Result<&'a str> {
    if by_name.contains_key(target) {
        Ok(target)
    } else {
        Err(Error::UnresolvedFlowTarget {
            task: task.name.clone(),
            target: target.to_string(),
        })
    }
}

fn misplaced(task: &Task, reason: impl Into<String>) -> Error {
    Error::InvalidFlowPlacement {
        task: task.name.clone(),
        reason: reason.into(),
    }
}

/// Validate and resolve a task's flow script. A task without one yields
/// `None`; a flow block alone is a plain marker and needs no wiring.
fn wire_flow(
    job: &Job,
    task: &Task,
    by_name: &HashMap<&str, usize>,
    graph: &DependencyGraph,
) -> Result<Option<NativeFlowScript>> {
    let Some(flow) = &task.flow_script else {
        return Ok(None);
    };

    let mut native = NativeFlowScript {
        action_type: flow.action_type(),
        script: NativeScript::from(&flow.script),
        target: None,
        target_else: None,
        target_continuation: None,
    };

    match &flow.action {
        FlowAction::Continue => {}
        FlowAction::Replicate => {
            // The script is evaluated by the engine; only placement is checked.
            if task.flow_block != FlowBlock::Start {
                return Err(misplaced(task, "replicate requires a start block"));
            }
        }
        FlowAction::Loop { target } => {
            let target = resolve(task, target, by_name)?;
            let start = &job.tasks()[by_name[target]];
            if start.flow_block != FlowBlock::Start {
                return Err(misplaced(
                    task,
                    format!("loop target {} is not a start block", target),
                ));
            }
            if !graph.reaches(target, &task.name) {
                return Err(misplaced(
                    task,
                    format!("loop target {} does not lead to this task", target),
                ));
            }
            native.target = Some(target.to_string());
        }
        FlowAction::If {
            target,
            else_target,
            continuation,
        } => {
            native.target = Some(resolve(task, target, by_name)?.to_string());
            native.target_else = Some(resolve(task, else_target, by_name)?.to_string());
            native.target_continuation =
                Some(resolve(task, continuation, by_name)?.to_string());
        }
    }

    tlog_trace!(
        "Builder: {} flow {} -> {:?}",
        task.name,
        native.action_type,
        flow.action.targets()
    );
    Ok(Some(native))
}
