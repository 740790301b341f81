//! Submission and result retrieval tests.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use taskflow::gateway::{JobFilter, JobStatus};
use taskflow::model::{Job, ScriptLanguage, Task};
use taskflow::Error;

use crate::fixtures::{connected_gateway, connected_gateway_over, echo_job, MockService};

/// Test: End-to-end echo job
/// Given job "J" with task "T1" echoing "ok"
/// When it is submitted and waited on for 30s
/// Then the result of "T1" is "ok"
#[tokio::test]
async fn test_end_to_end_echo() {
    let (gateway, service) = connected_gateway().await;
    let job = echo_job("J", &[("T1", "ok")]);

    let id = gateway.submit(&job).await.unwrap();
    let result = gateway
        .wait_for_job(&id, Duration::from_millis(30_000))
        .await
        .unwrap();

    assert_eq!(result.job_id, id);
    assert_eq!(result.all_results["T1"].value.to_text(), "ok");
    assert!(result.all_results["T1"].value.is_bytes());
    assert_eq!(service.submissions.load(Ordering::SeqCst), 1);
}

/// Test: Construction errors never reach the service
#[tokio::test]
async fn test_invalid_job_not_submitted() {
    let (gateway, service) = connected_gateway().await;

    let mut job = echo_job("J", &[("A", "a"), ("A", "again")]);
    let err = gateway.submit(&job).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateTask(ref name) if name == "A"));
    assert_eq!(service.submissions.load(Ordering::SeqCst), 0);

    // the job is still usable: fix it and resubmit
    let mut renamed = job.remove_task("A").unwrap();
    renamed.set_name("B");
    job.add_task(renamed);
    assert!(gateway.submit(&job).await.is_ok());
    assert_eq!(service.submissions.load(Ordering::SeqCst), 1);
}

/// Test: Dependencies reach the service as native edges
#[tokio::test]
async fn test_submitted_document_is_linked() {
    let (gateway, service) = connected_gateway().await;

    let mut job = Job::new("pipeline");
    let mut load = Task::new("Load", ScriptLanguage::python());
    load.add_dependency("Fetch");
    job.add_task(load);
    job.add_task(Task::new("Fetch", ScriptLanguage::bash()));

    let id = gateway.submit(&job).await.unwrap();
    let native = service.submitted(&id).unwrap();
    assert!(native.has_edge("Fetch", "Load"));
    assert_eq!(native.task("Load").unwrap().script.language, "cpython");
}

#[tokio::test]
async fn test_poll_until_finished() {
    let (gateway, _service) = connected_gateway_over(MockService::new().with_running_polls(3)).await;
    let id = gateway.submit(&echo_job("J", &[("T1", "ok")])).await.unwrap();

    let cancel = CancellationToken::new();
    let status = gateway
        .poll_until_finished(&id, Duration::from_millis(5), &cancel)
        .await
        .unwrap();
    assert_eq!(status, JobStatus::Finished);
    assert!(gateway.is_job_finished(&id).await.unwrap());

    let info = gateway.get_job_info(&id).await.unwrap();
    assert_eq!(info.progress(), (1, 1));
    assert_eq!(info.owner, "admin");
}

#[tokio::test]
async fn test_task_results_and_output() {
    let (gateway, _service) = connected_gateway().await;
    let job = echo_job("J", &[("B", "second"), ("A", "first")]);
    let id = gateway.submit(&job).await.unwrap();
    let timeout = Duration::from_secs(5);

    assert_eq!(gateway.get_task_result(&id, "A", timeout).await.unwrap(), "first");
    let err = gateway.get_task_result(&id, "C", timeout).await.unwrap_err();
    assert!(matches!(err, Error::TaskResultNotFound { ref task, .. } if task == "C"));

    // output is ordered by task name, not declaration order
    let output = gateway.get_job_output(&id, timeout).await.unwrap();
    assert_eq!(output, "[A] first\n[B] second\n");

    let result = gateway.get_result(&id, timeout).await.unwrap();
    let names: Vec<&str> = result.sorted().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["A", "B"]);
}

#[tokio::test]
async fn test_signals_and_administration() {
    let (gateway, service) = connected_gateway().await;
    let id = gateway.submit(&echo_job("J", &[("T1", "ok")])).await.unwrap();

    let mut variables = BTreeMap::new();
    variables.insert("reason".to_string(), "maintenance".to_string());
    assert!(gateway.send_signal(&id, "soft_stop", &variables).await.unwrap());
    assert_eq!(service.signals(&id), vec!["soft_stop".to_string()]);

    assert!(gateway.pause_job(&id).await.unwrap());
    assert_eq!(gateway.get_status(&id).await.unwrap(), JobStatus::Paused);
    assert!(gateway.resume_job(&id).await.unwrap());

    assert!(gateway.restart_task(&id, "T1", Some(10)).await.unwrap());
    assert!(gateway.preempt_task(&id, "T1", None).await.unwrap());
    assert!(!gateway.kill_task(&id, "missing").await.unwrap());

    assert!(gateway.kill_job(&id).await.unwrap());
    assert_eq!(gateway.get_status(&id).await.unwrap(), JobStatus::Killed);
    // killed jobs accept no further actions
    assert!(!gateway.pause_job(&id).await.unwrap());
}

#[tokio::test]
async fn test_list_jobs_and_catalog() {
    let (gateway, _service) = connected_gateway().await;
    gateway.submit(&echo_job("nightly-1", &[("T", "x")])).await.unwrap();
    gateway.submit(&echo_job("nightly-2", &[("T", "y")])).await.unwrap();
    gateway.submit(&echo_job("adhoc", &[("T", "z")])).await.unwrap();

    let all = gateway.list_jobs(&JobFilter::default(), None).await.unwrap();
    assert_eq!(all.len(), 3);

    let nightly = gateway
        .list_jobs(&JobFilter::default().mine().named("nightly-*"), None)
        .await
        .unwrap();
    assert_eq!(nightly.len(), 2);

    let capped = gateway.list_jobs(&JobFilter::default(), Some(1)).await.unwrap();
    assert_eq!(capped.len(), 1);

    let id = gateway
        .submit_from_catalog("basic-examples", "Print_File_Name", &BTreeMap::new())
        .await
        .unwrap();
    assert_eq!(gateway.get_job_info(&id).await.unwrap().name, "Print_File_Name");

    let err = gateway
        .submit_from_catalog("nope", "x", &BTreeMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Remote(_)));
}

#[tokio::test]
async fn test_export_uses_wire_format() {
    let (gateway, _service) = connected_gateway().await;
    let wire = gateway.export(&echo_job("J", &[("T1", "ok")])).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&wire).unwrap();
    assert_eq!(doc["name"], "J");
    assert_eq!(doc["tasks"][0]["name"], "T1");
    assert!(doc["tasks"][0].get("fork_environment").is_none());
}
