use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Fixed delay between reconnect attempts.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectSchedule {
    delay: Duration,
}

impl ReconnectSchedule {
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sleep for the delay. Returns `false` if cancelled before it elapsed.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.delay) => true,
        }
    }
}

impl Default for ReconnectSchedule {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}
