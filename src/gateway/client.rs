//! Session-holding client for the execution service.
//!
//! A `Gateway` owns one session. `connect`, `reconnect` and `disconnect`
//! take the session write lock for their whole duration; every other call
//! only reads the token, so concurrent reads on one instance are fine.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::builder::{Builder, NativeJob};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::gateway::service::{
    ExecutionService, JobAction, JobFilter, JobId, JobInfo, JobResult, JobStatus, TaskAction,
};
use crate::gateway::session::{Credentials, SessionState, SessionToken};
use crate::model::Job;
use crate::util::{millis, with_timeout};
use crate::{tlog, tlog_debug, tlog_trace, tlog_warn};

/// Default poll interval when no config is supplied.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default bound for `wait_for_job` when no config is supplied.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Default cap on `list_jobs` results.
pub const DEFAULT_MAX_JOBS: usize = 1000;

#[derive(Debug, Default)]
struct Session {
    state: SessionState,
    token: Option<SessionToken>,
    credentials: Option<Credentials>,
}

pub struct Gateway {
    service: Arc<dyn ExecutionService>,
    builder: Builder,
    session: RwLock<Session>,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl Gateway {
    pub fn new(service: Arc<dyn ExecutionService>) -> Self {
        Self {
            service,
            builder: Builder::new(),
            session: RwLock::new(Session::default()),
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Gateway with poll and wait defaults taken from `config`.
    pub fn with_config(service: Arc<dyn ExecutionService>, config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            wait_timeout: config.wait_timeout(),
            ..Self::new(service)
        }
    }

    /// Gateway with credentials cached for a later `reconnect()`.
    pub fn with_credentials(service: Arc<dyn ExecutionService>, credentials: Credentials) -> Self {
        Self {
            session: RwLock::new(Session {
                credentials: Some(credentials),
                ..Session::default()
            }),
            ..Self::new(service)
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    pub async fn state(&self) -> SessionState {
        self.session.read().await.state
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == SessionState::Connected
    }

    /// Log in and store the session token.
    ///
    /// An existing session is logged out first. On failure the gateway is
    /// left `Disconnected` and the service error is returned.
    pub async fn connect(&self, credentials: Credentials) -> Result<()> {
        let mut session = self.session.write().await;
        self.establish(&mut session, credentials).await
    }

    /// Re-establish the session with the cached credentials.
    ///
    /// Works whether or not a session was ever connected, as long as
    /// credentials are known.
    pub async fn reconnect(&self) -> Result<()> {
        let mut session = self.session.write().await;
        let credentials = session
            .credentials
            .clone()
            .ok_or(Error::MissingCredentials)?;
        tlog_debug!("Gateway::reconnect user={}", credentials.username);
        self.establish(&mut session, credentials).await
    }

    /// Tear the session down. Calling this while disconnected is a no-op.
    ///
    /// Logout is best effort: a failing logout is logged and the local
    /// session is cleared anyway.
    pub async fn disconnect(&self) -> Result<()> {
        let mut session = self.session.write().await;
        self.teardown(&mut session).await;
        Ok(())
    }

    async fn establish(&self, session: &mut Session, credentials: Credentials) -> Result<()> {
        if session.state == SessionState::Connected {
            self.teardown(session).await;
        }

        session.state = SessionState::Connecting;
        tlog!("Gateway: {} -> {}", SessionState::Disconnected, session.state);

        let login = self
            .service
            .login(&credentials.username, &credentials.password)
            .await;
        session.credentials = Some(credentials);

        match login {
            Ok(token) => {
                session.token = Some(token);
                session.state = SessionState::Connected;
                tlog!("Gateway: {} -> {}", SessionState::Connecting, session.state);
                Ok(())
            }
            Err(e) => {
                session.token = None;
                session.state = SessionState::Disconnected;
                tlog_warn!("Gateway: login failed: {}", e);
                Err(e)
            }
        }
    }

    async fn teardown(&self, session: &mut Session) {
        if let Some(token) = session.token.take() {
            if let Err(e) = self.service.logout(&token).await {
                tlog_warn!("Gateway: logout failed: {}", e);
            }
        }
        if session.state != SessionState::Disconnected {
            tlog!("Gateway: {} -> {}", session.state, SessionState::Disconnected);
        }
        session.state = SessionState::Disconnected;
    }

    async fn token(&self) -> Result<SessionToken> {
        let session = self.session.read().await;
        match (&session.state, &session.token) {
            (SessionState::Connected, Some(token)) => Ok(token.clone()),
            _ => Err(Error::NotConnected),
        }
    }

    /// Compile without submitting. Needs no session.
    pub fn compile(&self, job: &Job) -> Result<NativeJob> {
        self.builder.compile(job)
    }

    /// Compile `job` and hand it to the service.
    ///
    /// Construction errors surface before any network call, so nothing is
    /// ever partially submitted.
    pub async fn submit(&self, job: &Job) -> Result<JobId> {
        let token = self.token().await?;
        let native = self.builder.compile(job)?;
        tlog_debug!(
            "Gateway::submit job={} tasks={}",
            native.name,
            native.task_count()
        );

        let id = self
            .service
            .submit(
                &token,
                &native,
                Some(job.input_folder.as_str()),
                Some(job.output_folder.as_str()),
            )
            .await?;
        tlog!("Gateway: submitted job {} as {}", job.name, id);
        Ok(id)
    }

    /// Submit a workflow stored in the service's catalog.
    pub async fn submit_from_catalog(
        &self,
        bucket: &str,
        workflow: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<JobId> {
        let token = self.token().await?;
        let id = self
            .service
            .submit_from_catalog(&token, bucket, workflow, variables)
            .await?;
        tlog!("Gateway: submitted {}/{} as {}", bucket, workflow, id);
        Ok(id)
    }

    /// Compile `job` and serialize it with the service's interchange format.
    pub fn export(&self, job: &Job) -> Result<String> {
        let native = self.builder.compile(job)?;
        self.service.to_wire_format(&native)
    }

    pub async fn get_job_info(&self, id: &JobId) -> Result<JobInfo> {
        let token = self.token().await?;
        self.service.get_job_info(&token, id).await
    }

    pub async fn get_status(&self, id: &JobId) -> Result<JobStatus> {
        let info = self.get_job_info(id).await?;
        tlog_trace!("Gateway::get_status job={} status={}", id, info.status);
        Ok(info.status)
    }

    pub async fn is_job_finished(&self, id: &JobId) -> Result<bool> {
        Ok(self.get_status(id).await?.is_terminal())
    }

    /// Wait for the job to end, at most `timeout`.
    ///
    /// `Error::Timeout` means only that the wait expired; the job may still
    /// be running.
    pub async fn wait_for_job(&self, id: &JobId, timeout: Duration) -> Result<JobResult> {
        let token = self.token().await?;
        tlog_debug!("Gateway::wait_for_job job={} timeout={:?}", id, timeout);
        with_timeout(
            timeout,
            self.service.wait_for_job(&token, id, millis(timeout)),
        )
        .await
    }

    /// Poll the job status every `interval` until it is finished, canceled
    /// or failed.
    ///
    /// `cancel` is checked once per iteration and also interrupts the sleep.
    pub async fn poll_until_finished(
        &self,
        id: &JobId,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<JobStatus> {
        loop {
            if cancel.is_cancelled() {
                tlog_debug!("Gateway::poll_until_finished job={} cancelled", id);
                return Err(Error::Cancelled);
            }

            let status = self.get_status(id).await?;
            if status.ends_polling() {
                tlog_debug!("Gateway::poll_until_finished job={} -> {}", id, status);
                return Ok(status);
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tlog_debug!("Gateway::poll_until_finished job={} cancelled", id);
                    return Err(Error::Cancelled);
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// `poll_until_finished` at the configured interval.
    pub async fn poll(&self, id: &JobId, cancel: &CancellationToken) -> Result<JobStatus> {
        self.poll_until_finished(id, self.poll_interval, cancel).await
    }

    /// All task results, waiting at most `timeout` for the job to end.
    pub async fn get_result(&self, id: &JobId, timeout: Duration) -> Result<JobResult> {
        self.wait_for_job(id, timeout).await
    }

    /// One task's result as text, waiting at most `timeout`.
    pub async fn get_task_result(
        &self,
        id: &JobId,
        task: &str,
        timeout: Duration,
    ) -> Result<String> {
        let result = self.wait_for_job(id, timeout).await?;
        result.value(task).ok_or_else(|| Error::TaskResultNotFound {
            job: id.to_string(),
            task: task.to_string(),
        })
    }

    /// Every task's stdout, in task name order.
    pub async fn get_job_output(&self, id: &JobId, timeout: Duration) -> Result<String> {
        let result = self.wait_for_job(id, timeout).await?;
        Ok(result
            .sorted()
            .into_iter()
            .map(|(_, r)| r.stdout.as_str())
            .collect())
    }

    /// Post a signal to a running job. Returns whether the service accepted
    /// it; the call does not wait for the job to react.
    pub async fn send_signal(
        &self,
        id: &JobId,
        signal: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<bool> {
        let token = self.token().await?;
        let code = self
            .service
            .send_signal(&token, id, signal, variables)
            .await?;
        tlog_debug!("Gateway::send_signal job={} signal={} status={}", id, signal, code);
        Ok((200..300).contains(&code))
    }

    async fn job_action(&self, id: &JobId, action: JobAction) -> Result<bool> {
        let token = self.token().await?;
        let accepted = self.service.job_action(&token, id, action).await?;
        tlog!("Gateway: {:?} job {} accepted={}", action, id, accepted);
        Ok(accepted)
    }

    pub async fn kill_job(&self, id: &JobId) -> Result<bool> {
        self.job_action(id, JobAction::Kill).await
    }

    pub async fn pause_job(&self, id: &JobId) -> Result<bool> {
        self.job_action(id, JobAction::Pause).await
    }

    pub async fn resume_job(&self, id: &JobId) -> Result<bool> {
        self.job_action(id, JobAction::Resume).await
    }

    async fn task_action(
        &self,
        id: &JobId,
        task: &str,
        action: TaskAction,
        delay_secs: Option<u32>,
    ) -> Result<bool> {
        let token = self.token().await?;
        let accepted = self
            .service
            .task_action(&token, id, task, action, delay_secs)
            .await?;
        tlog!(
            "Gateway: {:?} task {} of job {} accepted={}",
            action,
            task,
            id,
            accepted
        );
        Ok(accepted)
    }

    pub async fn kill_task(&self, id: &JobId, task: &str) -> Result<bool> {
        self.task_action(id, task, TaskAction::Kill, None).await
    }

    /// Restart a task after `delay_secs` (service default when `None`).
    pub async fn restart_task(&self, id: &JobId, task: &str, delay_secs: Option<u32>) -> Result<bool> {
        self.task_action(id, task, TaskAction::Restart, delay_secs)
            .await
    }

    pub async fn preempt_task(&self, id: &JobId, task: &str, delay_secs: Option<u32>) -> Result<bool> {
        self.task_action(id, task, TaskAction::Preempt, delay_secs)
            .await
    }

    /// Jobs matching `filter`, capped at `max_count`
    /// (`DEFAULT_MAX_JOBS` when `None`).
    pub async fn list_jobs(&self, filter: &JobFilter, max_count: Option<usize>) -> Result<Vec<JobInfo>> {
        let token = self.token().await?;
        let max = max_count.unwrap_or(DEFAULT_MAX_JOBS);
        let jobs = self.service.list_jobs(&token, filter, max).await?;
        tlog_debug!("Gateway::list_jobs max={} found={}", max, jobs.len());
        Ok(jobs)
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("poll_interval", &self.poll_interval)
            .field("wait_timeout", &self.wait_timeout)
            .finish_non_exhaustive()
    }
}
