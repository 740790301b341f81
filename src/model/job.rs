//! Job graph: a named, ordered collection of tasks plus job-level settings.

use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};
use crate::model::task::Task;

/// A job graph. Owns its tasks; tasks refer to each other by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub name: String,
    tasks: Vec<Task>,
    pub variables: BTreeMap<String, String>,
    pub generic_information: BTreeMap<String, String>,
    /// Local folder input files are read from.
    pub input_folder: String,
    /// Local folder output files are written to.
    pub output_folder: String,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
            variables: BTreeMap::new(),
            generic_information: BTreeMap::new(),
            input_folder: ".".to_string(),
            output_folder: ".".to_string(),
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Append a task. Names are checked when the job is validated or
    /// compiled, so a graph can be assembled in any order.
    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Remove the first task called `name`.
    pub fn remove_task(&mut self, name: &str) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.name == name)?;
        Some(self.tasks.remove(index))
    }

    pub fn clear_tasks(&mut self) {
        self.tasks.clear();
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn task_mut(&mut self, name: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.name == name)
    }

    pub fn contains_task(&self, name: &str) -> bool {
        self.task(name).is_some()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn add_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn remove_variable(&mut self, key: &str) -> Option<String> {
        self.variables.remove(key)
    }

    pub fn clear_variables(&mut self) {
        self.variables.clear();
    }

    pub fn has_variables(&self) -> bool {
        !self.variables.is_empty()
    }

    pub fn add_generic_information(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.generic_information.insert(key.into(), value.into());
    }

    pub fn remove_generic_information(&mut self, key: &str) -> Option<String> {
        self.generic_information.remove(key)
    }

    pub fn clear_generic_information(&mut self) {
        self.generic_information.clear();
    }

    pub fn set_input_folder(&mut self, folder: impl Into<String>) {
        self.input_folder = folder.into();
    }

    pub fn set_output_folder(&mut self, folder: impl Into<String>) {
        self.output_folder = folder.into();
    }

    /// Structural checks that need no graph: a non-empty job name, unique
    /// non-empty task names, and every dependency naming a task of this job.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::EmptyJobName);
        }

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task.name.trim().is_empty() {
                return Err(Error::EmptyTaskName);
            }
            if !seen.insert(task.name.as_str()) {
                return Err(Error::DuplicateTask(task.name.clone()));
            }
        }

        for task in &self.tasks {
            for dep in task.dependencies() {
                if !seen.contains(dep.as_str()) {
                    return Err(Error::UnresolvedDependency {
                        task: task.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
