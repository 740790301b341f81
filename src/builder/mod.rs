//! Compilation of job graphs into the execution service's native form.

pub mod compile;
pub mod graph;
pub mod native;

pub use compile::{compile, Builder};
pub use graph::DependencyGraph;
pub use native::{
    AccessMode, NativeFileSelector, NativeFlowScript, NativeForkEnvironment, NativeJob,
    NativeScript, NativeSelectionScript, NativeTask, SelectionKind,
};
