//! Readiness polling
//!
//! Replaces a fixed settle delay with a bounded poll of an application URL.
//! The deadline only limits how long polling continues: the URL is always
//! tried at least once, so a zero timeout still answers "is it up now?".

use std::fmt;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info};
use url::Url;

use crate::error::{E2eError, E2eResult};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Why the most recent request did not count as ready
enum NotReady {
    /// Nothing accepting connections yet
    Refused,
    Status(reqwest::StatusCode),
    Failed(reqwest::Error),
}

impl fmt::Display for NotReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotReady::Refused => write!(f, "connection refused"),
            NotReady::Status(status) => write!(f, "answered {}", status),
            NotReady::Failed(e) => write!(f, "{}", e),
        }
    }
}

async fn check(client: &reqwest::Client, url: &Url) -> Result<(), NotReady> {
    match client.get(url.clone()).send().await {
        Ok(resp) if resp.status().is_success() => Ok(()),
        Ok(resp) => Err(NotReady::Status(resp.status())),
        Err(e) if e.is_connect() => Err(NotReady::Refused),
        Err(e) => Err(NotReady::Failed(e)),
    }
}

/// Poll `url` until it answers with a success status or `timeout` elapses.
///
/// The returned [`E2eError::ServerHealthCheck`] names the URL, the number of
/// attempts and the last reason it was not ready.
pub async fn wait_until_ready(url: &Url, timeout: Duration) -> E2eResult<()> {
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let deadline = Instant::now() + timeout;
    let mut attempts = 0;

    loop {
        attempts += 1;
        let not_ready = match check(&client, url).await {
            Ok(()) => {
                info!("{} ready after {} attempt(s)", url, attempts);
                return Ok(());
            }
            Err(reason) => reason,
        };
        debug!("{} not ready (attempt {}): {}", url, attempts, not_ready);

        if Instant::now() + POLL_INTERVAL > deadline {
            return Err(E2eError::ServerHealthCheck {
                url: url.to_string(),
                attempts,
                last: not_ready.to_string(),
            });
        }
        sleep(POLL_INTERVAL).await;
    }
}
