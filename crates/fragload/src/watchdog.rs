use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Single deadline bounding a whole part chain.
///
/// Clones share the disarm state; once disarmed, [`Watchdog::expired`] never
/// completes.
#[derive(Clone, Debug)]
pub(crate) struct Watchdog {
    deadline: Instant,
    disarmed: CancellationToken,
}

impl Watchdog {
    pub(crate) fn arm(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            disarmed: CancellationToken::new(),
        }
    }

    pub(crate) fn disarm(&self) {
        self.disarmed.cancel();
    }

    #[cfg(test)]
    pub(crate) fn is_disarmed(&self) -> bool {
        self.disarmed.is_cancelled()
    }

    pub(crate) async fn expired(&self) {
        tokio::select! {
            biased;
            () = self.disarmed.cancelled() => std::future::pending::<()>().await,
            () = sleep_until(self.deadline) => {}
        }
    }
}
