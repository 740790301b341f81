//! Declarative job construction on top of the model.

pub mod context;
pub mod file;

pub use context::{
    ContextState, FlowRole, JobContext, Procedure, RunOptions, RunOutcome, TaskBody, TaskDef,
};
pub use file::{FlowEntry, JobFile, TaskEntry};
