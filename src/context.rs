//! Per-call deadline.

use crate::error::DeviceError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Deadline supplied by the caller for one operation.
///
/// Applies to the primary request only. Background drift checks scheduled by
/// the operation run without it. Cancellation is dropping the returned future.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallContext {
    deadline: Option<(Instant, Duration)>,
}

impl CallContext {
    /// No deadline beyond the per-request HTTP timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline `budget` from now.
    pub fn with_timeout(budget: Duration) -> Self {
        Self {
            deadline: Some((Instant::now() + budget, budget)),
        }
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|(at, _)| at.saturating_duration_since(Instant::now()))
    }

    /// Run `fut` under this context's deadline.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, DeviceError>
    where
        F: Future<Output = Result<T, DeviceError>>,
    {
        match self.deadline {
            None => fut.await,
            Some((at, budget)) => tokio::time::timeout_at(at, fut)
                .await
                .unwrap_or(Err(DeviceError::DeadlineExceeded(budget))),
        }
    }
}
