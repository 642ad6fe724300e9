//! Polling helpers. The fixture is eventually consistent, so every check
//! goes through a bounded wait.

use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Poll `condition` every `interval` until it returns true or `timeout`
/// elapses. Returns whether the condition was met.
pub async fn wait_for_condition<F>(mut condition: F, timeout: Duration, interval: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}
