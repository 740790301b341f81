//! Session lifecycle tests: connect, disconnect, reconnect, expiry,
//! timeouts and poll cancellation.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use taskflow::config::Config;
use taskflow::gateway::{Credentials, Gateway, JobId, SessionState};
use taskflow::Error;

use crate::fixtures::{connected_gateway, credentials, echo_job, MockService};

/// Test: Idempotent disconnect
/// Given a connected gateway
/// When disconnect is called twice
/// Then neither call fails and the gateway ends disconnected
#[tokio::test]
async fn test_double_disconnect() {
    let (gateway, _service) = connected_gateway().await;
    gateway.disconnect().await.unwrap();
    gateway.disconnect().await.unwrap();
    assert_eq!(gateway.state().await, SessionState::Disconnected);
}

/// Test: Reconnect without a prior connect
/// Given a gateway created with credentials but never connected
/// When reconnect is called
/// Then it behaves like connect
#[tokio::test]
async fn test_reconnect_without_connect() {
    let gateway = Gateway::with_credentials(Arc::new(MockService::new()), credentials());
    assert!(!gateway.is_connected().await);

    gateway.reconnect().await.unwrap();
    assert!(gateway.is_connected().await);
    assert!(gateway.submit(&echo_job("J", &[("T1", "ok")])).await.is_ok());
}

#[tokio::test]
async fn test_operations_require_connection() {
    let gateway = Gateway::new(Arc::new(MockService::new()));
    let id = JobId::new("1");

    assert!(matches!(
        gateway.submit(&echo_job("J", &[("T1", "ok")])).await,
        Err(Error::NotConnected)
    ));
    assert!(matches!(gateway.get_status(&id).await, Err(Error::NotConnected)));
    assert!(matches!(
        gateway.wait_for_job(&id, Duration::from_secs(1)).await,
        Err(Error::NotConnected)
    ));
    assert!(matches!(gateway.resume_job(&id).await, Err(Error::NotConnected)));
    assert!(matches!(gateway.reconnect().await, Err(Error::MissingCredentials)));
}

#[tokio::test]
async fn test_authentication_failure() {
    let gateway = Gateway::new(Arc::new(MockService::new()));
    let err = gateway
        .connect(Credentials::new("admin", "nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
    assert!(err.is_session());
    assert_eq!(gateway.state().await, SessionState::Disconnected);
}

/// Test: Expired session recovery
/// Given the service dropped every session
/// When a call fails with SessionExpired
/// Then the gateway stays connected locally, and reconnect plus one retry succeeds
#[tokio::test]
async fn test_expired_session_then_reconnect() {
    let (gateway, service) = connected_gateway().await;
    let job = echo_job("J", &[("T1", "ok")]);

    service.expire_sessions();
    let err = gateway.submit(&job).await.unwrap_err();
    assert!(matches!(err, Error::SessionExpired));
    assert!(gateway.is_connected().await);

    gateway.reconnect().await.unwrap();
    assert!(gateway.submit(&job).await.is_ok());
}

#[tokio::test]
async fn test_disconnect_then_reconnect() {
    let (gateway, _service) = connected_gateway().await;
    gateway.disconnect().await.unwrap();
    assert!(matches!(
        gateway.get_status(&JobId::new("1")).await,
        Err(Error::NotConnected)
    ));

    gateway.reconnect().await.unwrap();
    assert!(gateway.is_connected().await);
}

/// Test: Wait timeout
/// Given a job that never finishes
/// When waited on with a short timeout
/// Then a Timeout error is returned and the session is untouched
#[tokio::test]
async fn test_wait_timeout() {
    let (gateway, service) = connected_gateway().await;
    let id = gateway.submit(&echo_job("J", &[("T1", "ok")])).await.unwrap();
    service.hang.store(true, Ordering::SeqCst);

    let err = gateway
        .wait_for_job(&id, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(d) if d == Duration::from_millis(50)));
    assert!(gateway.is_connected().await);
}

/// Test: Poll cancellation
/// Given a job that keeps running
/// When the cancellation token fires mid-sleep
/// Then polling stops with Cancelled well before the interval elapses
#[tokio::test]
async fn test_poll_cancellation() {
    let service = MockService::new().with_running_polls(usize::MAX - 1);
    let (gateway, _service) = crate::fixtures::connected_gateway_over(service).await;
    let id = gateway.submit(&echo_job("J", &[("T1", "ok")])).await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = gateway
        .poll_until_finished(&id, Duration::from_secs(30), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_poll_with_cancelled_token_does_not_query() {
    let (gateway, _service) = connected_gateway().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    // an unknown job id would fail if queried
    let err = gateway
        .poll_until_finished(&JobId::new("999"), Duration::from_millis(1), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn test_ownership_enforced() {
    let service = Arc::new(MockService::new());
    let owner = Gateway::new(service.clone());
    owner.connect(credentials()).await.unwrap();
    let id = owner.submit(&echo_job("J", &[("T1", "ok")])).await.unwrap();

    let other = Gateway::new(service.clone());
    other.connect(Credentials::new("guest", "guest")).await.unwrap();
    assert!(!other.kill_job(&id).await.unwrap());
    assert!(owner.kill_job(&id).await.unwrap());
}

#[tokio::test]
async fn test_gateway_from_config() {
    let config = Config {
        poll_interval_ms: 10,
        wait_timeout_ms: 200,
        ..Config::default()
    };
    let service = Arc::new(MockService::new());
    let gateway = Gateway::with_config(service, &config);
    gateway.connect(credentials()).await.unwrap();
    let id = gateway.submit(&echo_job("J", &[("T1", "ok")])).await.unwrap();

    let status = gateway.poll(&id, &CancellationToken::new()).await.unwrap();
    assert!(status.is_terminal());
    assert_eq!(gateway.wait_timeout(), Duration::from_millis(200));
}
