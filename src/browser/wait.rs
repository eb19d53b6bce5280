use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};

use crate::errors::WaitTimeout;

#[derive(Debug, Error)]
pub enum WaitError {
    #[error(transparent)]
    Timeout(WaitTimeout),
    #[error("probe failed while waiting: {0:#}")]
    Probe(anyhow::Error),
}

/// Poll `probe` every `poll` until it yields a value or `timeout` elapses.
///
/// The probe runs at least once, even with a zero timeout.
pub async fn wait_until<T, F, Fut>(
    condition: &str,
    timeout: Duration,
    poll: Duration,
    mut probe: F,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = probe().await.map_err(WaitError::Probe)? {
            return Ok(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::Timeout(WaitTimeout {
                condition: condition.to_owned(),
                timeout,
            }));
        }
        sleep(poll.min(deadline - now)).await;
    }
}
