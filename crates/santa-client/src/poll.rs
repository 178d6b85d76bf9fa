//! cancellable join status polling
//!
//! waits for the decryption oracle to resolve a pending join. polling can be
//! abandoned at any point and restarted from scratch; the ledger record
//! is unaffected either way

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use santa_core::{GameId, JoinAction, JoinStatus, JoinTracker};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::Result;

/// caller-held cancel switch. cloneable, cancel is sticky
#[derive(Clone, Debug)]
pub struct PollCancel {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for PollCancel {
    fn default() -> Self {
        Self::new()
    }
}

impl PollCancel {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// receiving side of a [`PollCancel`]
#[derive(Debug)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// resolves once cancelled
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // switch dropped without cancelling
                std::future::pending::<()>().await;
            }
        }
    }
}

/// why polling stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// decrypted, completeJoin may be submitted
    Ready(JoinStatus),
    /// already a participant
    Registered,
    /// record seen earlier has gone without admission
    NoPending,
    Cancelled,
    TimedOut,
}

/// fixed interval poller with an overall deadline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoinPoller {
    interval: Duration,
    max_duration: Duration,
}

impl JoinPoller {
    pub fn new(interval: Duration, max_duration: Duration) -> Self {
        Self {
            interval,
            max_duration,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.poll_interval(), config.max_poll_duration())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// poll `fetch` until the join is ready, registered, gone, cancelled or
    /// out of time. fetch errors are logged and polling continues
    pub async fn run<F, Fut>(&self, game_id: GameId, mut fetch: F, cancel: &PollCancel) -> PollOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<JoinStatus>>,
    {
        let deadline = Instant::now() + self.max_duration;
        let mut signal = cancel.signal();
        // fresh tracker: a missing record only counts as gone once seen
        let mut tracker = JoinTracker::new(game_id);
        let mut polls = 0u32;

        loop {
            if cancel.is_cancelled() {
                return PollOutcome::Cancelled;
            }

            polls += 1;
            match fetch().await {
                Ok(status) => match tracker.observe(status) {
                    JoinAction::Done => return PollOutcome::Registered,
                    JoinAction::Complete => return PollOutcome::Ready(status),
                    JoinAction::Retry => return PollOutcome::NoPending,
                    _ => debug!(%game_id, polls, ?status, "join not ready"),
                },
                Err(e) => warn!(%game_id, polls, "polling error: {}", e),
            }

            let now = Instant::now();
            if now >= deadline {
                return PollOutcome::TimedOut;
            }
            let wait = self.interval.min(deadline - now);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = signal.cancelled() => return PollOutcome::Cancelled,
            }
        }
    }
}
