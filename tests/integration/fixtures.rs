//! Test fixtures for integration tests.
//!
//! Provides:
//! - `MockService`, an in-memory execution service
//! - Helpers for connected gateways and common job shapes

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use taskflow::builder::NativeJob;
use taskflow::gateway::{
    Credentials, ExecutionService, Gateway, JobAction, JobFilter, JobId, JobInfo, JobResult,
    JobStatus, ResultValue, SessionToken, TaskAction, TaskInfo, TaskResult, TaskStatus,
};
use taskflow::model::{Job, ScriptLanguage, Task};
use taskflow::{Error, Result};

pub const USER: &str = "admin";
pub const PASSWORD: &str = "admin";

struct MockJob {
    native: NativeJob,
    owner: String,
    polls: usize,
    status: JobStatus,
    signals: Vec<String>,
}

/// In-memory execution service.
///
/// Jobs report `PENDING`, then `RUNNING` for `running_polls` status
/// queries, then `FINISHED`. A task's result is the argument of an
/// `echo` implementation, or empty text.
pub struct MockService {
    users: HashMap<String, String>,
    sessions: Mutex<HashMap<String, String>>,
    jobs: Mutex<HashMap<JobId, MockJob>>,
    next_id: AtomicU64,
    next_token: AtomicU64,
    pub submissions: AtomicUsize,
    pub running_polls: usize,
    /// `wait_for_job` never returns.
    pub hang: AtomicBool,
}

impl MockService {
    pub fn new() -> Self {
        let mut users = HashMap::new();
        users.insert(USER.to_string(), PASSWORD.to_string());
        users.insert("guest".to_string(), "guest".to_string());
        Self {
            users,
            sessions: Mutex::new(HashMap::new()),
            jobs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            next_token: AtomicU64::new(1),
            submissions: AtomicUsize::new(0),
            running_polls: 2,
            hang: AtomicBool::new(false),
        }
    }

    pub fn with_running_polls(mut self, polls: usize) -> Self {
        self.running_polls = polls;
        self
    }

    /// Drop every session, as a server restart would.
    pub fn expire_sessions(&self) {
        self.sessions.lock().unwrap().clear();
    }

    pub fn signals(&self, id: &JobId) -> Vec<String> {
        self.jobs
            .lock()
            .unwrap()
            .get(id)
            .map(|j| j.signals.clone())
            .unwrap_or_default()
    }

    pub fn submitted(&self, id: &JobId) -> Option<NativeJob> {
        self.jobs.lock().unwrap().get(id).map(|j| j.native.clone())
    }

    fn user_of(&self, token: &SessionToken) -> Result<String> {
        self.sessions
            .lock()
            .unwrap()
            .get(token.expose())
            .cloned()
            .ok_or(Error::SessionExpired)
    }

    fn register(&self, native: NativeJob, owner: String) -> JobId {
        let id = JobId::from(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.submissions.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().unwrap().insert(
            id.clone(),
            MockJob {
                native,
                owner,
                polls: 0,
                status: JobStatus::Pending,
                signals: Vec::new(),
            },
        );
        id
    }

    fn info_of(id: &JobId, job: &MockJob) -> JobInfo {
        let task_status = if job.status == JobStatus::Finished {
            TaskStatus::Finished
        } else {
            TaskStatus::Pending
        };
        JobInfo {
            id: id.clone(),
            name: job.native.name.clone(),
            status: job.status,
            owner: job.owner.clone(),
            tasks: job
                .native
                .tasks
                .iter()
                .map(|t| TaskInfo {
                    name: t.name.clone(),
                    status: task_status,
                    progress: if task_status == TaskStatus::Finished { 100 } else { 0 },
                })
                .collect(),
        }
    }

    fn advance(&self, job: &mut MockJob) {
        if job.status.is_terminal() || job.status == JobStatus::Paused {
            return;
        }
        job.polls += 1;
        job.status = if job.polls == 1 {
            JobStatus::Pending
        } else if job.polls <= 1 + self.running_polls {
            JobStatus::Running
        } else {
            JobStatus::Finished
        };
    }
}

fn echo_output(code: &str) -> String {
    code.trim()
        .strip_prefix("echo ")
        .map(|rest| rest.trim().trim_matches('"').to_string())
        .unwrap_or_default()
}

impl ExecutionService for MockService {
    fn login<'a>(&'a self, username: &'a str, password: &'a str) -> BoxFuture<'a, Result<SessionToken>> {
        Box::pin(async move {
            match self.users.get(username) {
                Some(expected) if expected == password => {
                    let token = format!("tok-{}", self.next_token.fetch_add(1, Ordering::SeqCst));
                    self.sessions
                        .lock()
                        .unwrap()
                        .insert(token.clone(), username.to_string());
                    Ok(SessionToken::new(token))
                }
                _ => Err(Error::Authentication(format!("bad credentials for {}", username))),
            }
        })
    }

    fn logout<'a>(&'a self, token: &'a SessionToken) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.sessions.lock().unwrap().remove(token.expose());
            Ok(())
        })
    }

    fn submit<'a>(
        &'a self,
        token: &'a SessionToken,
        job: &'a NativeJob,
        _input_folder: Option<&'a str>,
        _output_folder: Option<&'a str>,
    ) -> BoxFuture<'a, Result<JobId>> {
        Box::pin(async move {
            let owner = self.user_of(token)?;
            Ok(self.register(job.clone(), owner))
        })
    }

    fn submit_from_catalog<'a>(
        &'a self,
        token: &'a SessionToken,
        bucket: &'a str,
        workflow: &'a str,
        variables: &'a BTreeMap<String, String>,
    ) -> BoxFuture<'a, Result<JobId>> {
        Box::pin(async move {
            let owner = self.user_of(token)?;
            if bucket != "basic-examples" {
                return Err(Error::Remote(format!("unknown bucket {}", bucket)));
            }
            let native = NativeJob {
                name: workflow.to_string(),
                variables: variables.clone(),
                generic_information: BTreeMap::new(),
                tasks: Vec::new(),
            };
            Ok(self.register(native, owner))
        })
    }

    fn get_job_info<'a>(&'a self, token: &'a SessionToken, job: &'a JobId) -> BoxFuture<'a, Result<JobInfo>> {
        Box::pin(async move {
            self.user_of(token)?;
            let mut jobs = self.jobs.lock().unwrap();
            let entry = jobs
                .get_mut(job)
                .ok_or_else(|| Error::Remote(format!("unknown job {}", job)))?;
            self.advance(entry);
            Ok(Self::info_of(job, entry))
        })
    }

    fn wait_for_job<'a>(
        &'a self,
        token: &'a SessionToken,
        job: &'a JobId,
        _timeout_ms: u64,
    ) -> BoxFuture<'a, Result<JobResult>> {
        Box::pin(async move {
            self.user_of(token)?;
            if self.hang.load(Ordering::SeqCst) {
                futures::future::pending::<()>().await;
            }

            let mut jobs = self.jobs.lock().unwrap();
            let entry = jobs
                .get_mut(job)
                .ok_or_else(|| Error::Remote(format!("unknown job {}", job)))?;
            entry.status = JobStatus::Finished;

            let all_results = entry
                .native
                .tasks
                .iter()
                .map(|t| {
                    let out = t.script.code.as_deref().map(echo_output).unwrap_or_default();
                    let result = TaskResult {
                        value: ResultValue::Bytes(out.clone().into_bytes()),
                        stdout: format!("[{}] {}\n", t.name, out),
                    };
                    (t.name.clone(), result)
                })
                .collect::<HashMap<_, _>>();

            Ok(JobResult {
                job_id: job.clone(),
                all_results,
            })
        })
    }

    fn send_signal<'a>(
        &'a self,
        token: &'a SessionToken,
        job: &'a JobId,
        signal: &'a str,
        _variables: &'a BTreeMap<String, String>,
    ) -> BoxFuture<'a, Result<u16>> {
        Box::pin(async move {
            self.user_of(token)?;
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get_mut(job) {
                Some(entry) => {
                    entry.signals.push(signal.to_string());
                    Ok(200)
                }
                None => Ok(404),
            }
        })
    }

    fn job_action<'a>(
        &'a self,
        token: &'a SessionToken,
        job: &'a JobId,
        action: JobAction,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let user = self.user_of(token)?;
            let mut jobs = self.jobs.lock().unwrap();
            let Some(entry) = jobs.get_mut(job) else {
                return Ok(false);
            };
            if entry.owner != user || entry.status.is_terminal() {
                return Ok(false);
            }
            entry.status = match action {
                JobAction::Kill => JobStatus::Killed,
                JobAction::Pause => JobStatus::Paused,
                JobAction::Resume => JobStatus::Running,
            };
            Ok(true)
        })
    }

    fn task_action<'a>(
        &'a self,
        token: &'a SessionToken,
        job: &'a JobId,
        task: &'a str,
        _action: TaskAction,
        _delay_secs: Option<u32>,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let user = self.user_of(token)?;
            let jobs = self.jobs.lock().unwrap();
            Ok(jobs
                .get(job)
                .map(|j| j.owner == user && j.native.task(task).is_some())
                .unwrap_or(false))
        })
    }

    fn list_jobs<'a>(
        &'a self,
        token: &'a SessionToken,
        filter: &'a JobFilter,
        max_count: usize,
    ) -> BoxFuture<'a, Result<Vec<JobInfo>>> {
        Box::pin(async move {
            let user = self.user_of(token)?;
            let jobs = self.jobs.lock().unwrap();
            let mut found: Vec<JobInfo> = jobs
                .iter()
                .filter(|(_, j)| !filter.mine || j.owner == user)
                .filter(|(_, j)| filter.accepts_status(j.status))
                .filter(|(_, j)| match filter.name_glob.as_deref() {
                    Some(glob) => match glob.strip_suffix('*') {
                        Some(prefix) => j.native.name.starts_with(prefix),
                        None => j.native.name == glob,
                    },
                    None => true,
                })
                .map(|(id, j)| Self::info_of(id, j))
                .collect();
            found.sort_by(|a, b| a.id.cmp(&b.id));
            found.truncate(max_count);
            Ok(found)
        })
    }

    fn to_wire_format(&self, job: &NativeJob) -> Result<String> {
        job.to_json()
    }
}

pub fn credentials() -> Credentials {
    Credentials::new(USER, PASSWORD)
}

/// A gateway over a fresh mock service, already connected.
pub async fn connected_gateway() -> (Gateway, Arc<MockService>) {
    connected_gateway_over(MockService::new()).await
}

pub async fn connected_gateway_over(service: MockService) -> (Gateway, Arc<MockService>) {
    let service = Arc::new(service);
    let gateway = Gateway::new(service.clone());
    gateway
        .connect(credentials())
        .await
        .expect("mock login should succeed");
    (gateway, service)
}

/// Job `name` with one bash task per `(task, echoed text)` pair.
pub fn echo_job(name: &str, tasks: &[(&str, &str)]) -> Job {
    let mut job = Job::new(name);
    for (task_name, text) in tasks {
        let mut task = Task::new(*task_name, ScriptLanguage::bash());
        task.set_implementation(format!("echo \"{}\"", text));
        job.add_task(task);
    }
    job
}
