//! Submission and lifecycle management against an execution service.

pub mod client;
pub mod service;
pub mod session;

pub use client::{Gateway, DEFAULT_MAX_JOBS, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};
pub use service::{
    ExecutionService, JobAction, JobFilter, JobId, JobInfo, JobResult, JobStatus, ResultValue,
    TaskAction, TaskInfo, TaskResult, TaskStatus,
};
pub use session::{Credentials, SessionState, SessionToken};
