//! Execution Service boundary.
//!
//! The transport (HTTP, RMI, an in-process engine in tests) lives behind
//! [`ExecutionService`]; the gateway only ever talks to this trait.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::builder::NativeJob;
use crate::error::Result;
use crate::gateway::session::SessionToken;

/// Opaque job identifier issued by the execution service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Job state as reported by the execution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Paused,
    Finished,
    Canceled,
    Failed,
    InError,
    Stalled,
    Killed,
}

impl JobStatus {
    /// The job will not change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Canceled | JobStatus::Failed | JobStatus::Killed
        )
    }

    /// States that end `Gateway::poll_until_finished`.
    pub fn ends_polling(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Canceled | JobStatus::Failed
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Paused => "PAUSED",
            JobStatus::Finished => "FINISHED",
            JobStatus::Canceled => "CANCELED",
            JobStatus::Failed => "FAILED",
            JobStatus::InError => "IN_ERROR",
            JobStatus::Stalled => "STALLED",
            JobStatus::Killed => "KILLED",
        };
        write!(f, "{}", name)
    }
}

/// Task state as reported by the execution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Submitted,
    Pending,
    Running,
    Paused,
    Finished,
    Faulty,
    Failed,
    Skipped,
    Aborted,
    InError,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
    pub status: TaskStatus,
    /// Percent complete, 0..=100.
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: JobId,
    pub name: String,
    pub status: JobStatus,
    pub owner: String,
    #[serde(default)]
    pub tasks: Vec<TaskInfo>,
}

impl JobInfo {
    /// `(finished tasks, total tasks)`.
    pub fn progress(&self) -> (usize, usize) {
        let finished = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Finished)
            .count();
        (finished, self.tasks.len())
    }
}

/// A task's result value: text, or raw bytes as produced by the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl ResultValue {
    pub fn is_bytes(&self) -> bool {
        matches!(self, ResultValue::Bytes(_))
    }

    /// The value as text; bytes are decoded as UTF-8, lossily.
    pub fn to_text(&self) -> String {
        match self {
            ResultValue::Text(text) => text.clone(),
            ResultValue::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub value: ResultValue,
    #[serde(default)]
    pub stdout: String,
}

/// Results of a finished job, keyed by task name.
///
/// Map order follows the service, not task declaration order; use
/// [`JobResult::sorted`] for a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub all_results: HashMap<String, TaskResult>,
}

impl JobResult {
    pub fn value(&self, task: &str) -> Option<String> {
        self.all_results.get(task).map(|r| r.value.to_text())
    }

    /// Results sorted by task name.
    pub fn sorted(&self) -> Vec<(&str, &TaskResult)> {
        let mut results: Vec<(&str, &TaskResult)> = self
            .all_results
            .iter()
            .map(|(name, result)| (name.as_str(), result))
            .collect();
        results.sort_by(|a, b| a.0.cmp(b.0));
        results
    }
}

/// Criteria for listing jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    /// Only jobs owned by the session user.
    pub mine: bool,
    pub pending: bool,
    pub running: bool,
    pub finished: bool,
    pub name_glob: Option<String>,
    pub project: Option<String>,
    pub user: Option<String>,
    pub tenant: Option<String>,
    pub parent_id: Option<JobId>,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            mine: false,
            pending: true,
            running: true,
            finished: true,
            name_glob: None,
            project: None,
            user: None,
            tenant: None,
            parent_id: None,
        }
    }
}

impl JobFilter {
    pub fn mine(mut self) -> Self {
        self.mine = true;
        self
    }

    pub fn only_finished(mut self) -> Self {
        self.pending = false;
        self.running = false;
        self.finished = true;
        self
    }

    pub fn named(mut self, glob: impl Into<String>) -> Self {
        self.name_glob = Some(glob.into());
        self
    }

    /// Whether a job in `status` falls in the pending/running/finished selection.
    pub fn accepts_status(&self, status: JobStatus) -> bool {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Running | JobStatus::Paused | JobStatus::Stalled => self.running,
            _ => self.finished,
        }
    }
}

/// Job-wide administrative actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    Kill,
    Pause,
    Resume,
}

/// Per-task administrative actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    Kill,
    Restart,
    Preempt,
}

/// The remote engine that accepts, runs and reports on jobs.
///
/// Every call except `login` carries the session token. Failures come back
/// as crate errors: `SessionExpired` for a stale token, `Remote` for
/// rejections.
pub trait ExecutionService: Send + Sync + 'static {
    fn login<'a>(&'a self, username: &'a str, password: &'a str)
        -> BoxFuture<'a, Result<SessionToken>>;

    fn logout<'a>(&'a self, token: &'a SessionToken) -> BoxFuture<'a, Result<()>>;

    fn submit<'a>(
        &'a self,
        token: &'a SessionToken,
        job: &'a NativeJob,
        input_folder: Option<&'a str>,
        output_folder: Option<&'a str>,
    ) -> BoxFuture<'a, Result<JobId>>;

    /// Submit a workflow stored in the service's catalog.
    fn submit_from_catalog<'a>(
        &'a self,
        token: &'a SessionToken,
        bucket: &'a str,
        workflow: &'a str,
        variables: &'a BTreeMap<String, String>,
    ) -> BoxFuture<'a, Result<JobId>>;

    fn get_job_info<'a>(
        &'a self,
        token: &'a SessionToken,
        job: &'a JobId,
    ) -> BoxFuture<'a, Result<JobInfo>>;

    /// Block until the job ends or `timeout_ms` elapses (`Error::Timeout`).
    fn wait_for_job<'a>(
        &'a self,
        token: &'a SessionToken,
        job: &'a JobId,
        timeout_ms: u64,
    ) -> BoxFuture<'a, Result<JobResult>>;

    /// Post a signal; returns the service's HTTP-style status code.
    fn send_signal<'a>(
        &'a self,
        token: &'a SessionToken,
        job: &'a JobId,
        signal: &'a str,
        variables: &'a BTreeMap<String, String>,
    ) -> BoxFuture<'a, Result<u16>>;

    fn job_action<'a>(
        &'a self,
        token: &'a SessionToken,
        job: &'a JobId,
        action: JobAction,
    ) -> BoxFuture<'a, Result<bool>>;

    fn task_action<'a>(
        &'a self,
        token: &'a SessionToken,
        job: &'a JobId,
        task: &'a str,
        action: TaskAction,
        delay_secs: Option<u32>,
    ) -> BoxFuture<'a, Result<bool>>;

    fn list_jobs<'a>(
        &'a self,
        token: &'a SessionToken,
        filter: &'a JobFilter,
        max_count: usize,
    ) -> BoxFuture<'a, Result<Vec<JobInfo>>>;

    /// Serialize a compiled job into the service's interchange document.
    fn to_wire_format(&self, job: &NativeJob) -> Result<String>;
}
