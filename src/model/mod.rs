//! In-memory workflow model.
//!
//! Callers build a [`Job`] of [`Task`]s here, then hand it to the
//! builder. Nothing in this module talks to the network.

pub mod flow;
pub mod job;
pub mod language;
pub mod runtime_env;
pub mod script;
pub mod task;

pub use flow::{FlowActionType, FlowBlock};
pub use job::Job;
pub use language::{LanguageRegistry, ScriptLanguage};
pub use runtime_env::{ContainerPlatform, ContainerRuntime};
pub use script::{FlowAction, FlowScript, ForkEnvironment, Script, ScriptSource, SelectionScript};
pub use task::Task;
