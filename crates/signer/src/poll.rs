//! Bounded signature polling.
//!
//! [`Poller`] is a pure state machine: it counts attempts and classifies each
//! remote status into the next [`PollState`]. [`poll_until_terminal`] drives it
//! with a sleep-then-query loop that races every suspension point against a
//! [`CancellationToken`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::SigningError;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Attempt ceiling and inter-poll delay for one signing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Status reported by a custodial provider for one signature request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus<T> {
    Pending,
    Signed(T),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState<T> {
    Pending { remaining: u32 },
    Signed(T),
    Failed(String),
    TimedOut { attempts: u32 },
}

impl<T> PollState<T> {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending { .. })
    }
}

/// Bookkeeping for one in-flight signature request.
///
/// Owned by a single `sign()` call and dropped when it returns.
#[derive(Debug)]
pub struct Poller {
    request_id: String,
    remaining: u32,
    attempts: u32,
}

impl Poller {
    pub fn new(request_id: impl Into<String>, config: PollConfig) -> Self {
        Self {
            request_id: request_id.into(),
            remaining: config.max_attempts,
            attempts: 0,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Apply one observed status and return the resulting state.
    ///
    /// A `Pending` observation that exhausts the ceiling yields `TimedOut`.
    pub fn advance<T>(&mut self, status: RemoteStatus<T>) -> PollState<T> {
        self.attempts += 1;
        self.remaining = self.remaining.saturating_sub(1);

        match status {
            RemoteStatus::Signed(material) => PollState::Signed(material),
            RemoteStatus::Failed(reason) => PollState::Failed(reason),
            RemoteStatus::Pending if self.remaining == 0 => PollState::TimedOut {
                attempts: self.attempts,
            },
            RemoteStatus::Pending => PollState::Pending {
                remaining: self.remaining,
            },
        }
    }
}

/// Sleep, query, classify; repeat until a terminal state.
///
/// A transport error on a tick is logged and consumes the attempt. If the
/// final attempt failed that way, the timeout carries the error. A zero
/// attempt ceiling times out without querying.
pub async fn poll_until_terminal<T, E, F, Fut>(
    request_id: &str,
    config: PollConfig,
    cancel: &CancellationToken,
    mut query: F,
) -> Result<T, SigningError>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RemoteStatus<T>, E>>,
{
    let started = Instant::now();
    let mut poller = Poller::new(request_id, config);
    let mut last_error = None;

    if config.max_attempts == 0 {
        return Err(SigningError::TimedOut {
            request_id: request_id.to_string(),
            attempts: 0,
            elapsed: started.elapsed(),
            last_error,
        });
    }

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                return Err(SigningError::Cancelled {
                    request_id: Some(request_id.to_string()),
                });
            }
            () = tokio::time::sleep(config.interval) => {}
        }

        let observed = tokio::select! {
            () = cancel.cancelled() => {
                return Err(SigningError::Cancelled {
                    request_id: Some(request_id.to_string()),
                });
            }
            result = query() => result,
        };

        let status = match observed {
            Ok(status) => {
                last_error = None;
                status
            }
            Err(error) => {
                warn!(
                    request_id,
                    attempt = poller.attempts() + 1,
                    %error,
                    "Signature status query failed"
                );
                last_error = Some(error.to_string());
                RemoteStatus::Pending
            }
        };

        match poller.advance(status) {
            PollState::Pending { remaining } => {
                debug!(request_id, remaining, "Signature still pending");
            }
            PollState::Signed(material) => {
                debug!(
                    request_id,
                    attempts = poller.attempts(),
                    "Signature request completed"
                );
                return Ok(material);
            }
            PollState::Failed(reason) => {
                return Err(SigningError::Rejected {
                    request_id: request_id.to_string(),
                    reason,
                });
            }
            PollState::TimedOut { attempts } => {
                return Err(SigningError::TimedOut {
                    request_id: request_id.to_string(),
                    attempts,
                    elapsed: started.elapsed(),
                    last_error,
                });
            }
        }
    }
}
