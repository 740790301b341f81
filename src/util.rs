//! Shared utility functions.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::{Error, Result};

/// Bound a fallible future by `duration`, mapping expiry to `Error::Timeout`.
pub async fn with_timeout<F, T>(duration: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(duration, fut).await {
        Ok(inner) => inner,
        Err(_) => Err(Error::Timeout(duration)),
    }
}

/// Milliseconds in `duration`, saturating at `u64::MAX`.
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
