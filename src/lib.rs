//! Client library for building task-flow jobs and running them on a
//! remote execution service.
//!
//! - [`model`]: the in-memory job graph
//! - [`builder`]: compiles a job into the service's native document
//! - [`gateway`]: session handling, submission and job lifecycle
//! - [`declare`]: declarative construction and TOML job files

pub mod builder;
pub mod config;
pub mod declare;
pub mod error;
pub mod gateway;
pub mod log;
pub mod model;
pub mod util;

pub use error::{Error, Result};
