pub mod ws_client;

use std::time::Duration;

/// Polls a condition until it holds or the timeout elapses.
pub async fn eventually(what: &str, timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {:?}: {}",
            timeout,
            what
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
