//! Deadline scopes shared by the remote calls of one operation.
//!
//! A [`Deadline`] is opened at the start of a verb and every remote call the
//! verb issues is run through it. Whichever finishes first, the call or the
//! timer, decides the outcome; an elapsed deadline always wins over the
//! call's own result. The timer lives only inside [`Deadline::run`], so
//! nothing outlives the operation that opened the scope.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{VsphereError, VsphereResult};

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    timeout: Duration,
    expires_at: Instant,
}

impl Deadline {
    /// Open a scope that expires `timeout` from now.
    pub fn start(timeout: Duration) -> Self {
        Self {
            timeout,
            expires_at: Instant::now() + timeout,
        }
    }

    pub fn has_elapsed(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Classify the result of a call that has already returned.
    pub fn check<T>(&self, result: VsphereResult<T>) -> VsphereResult<T> {
        if self.has_elapsed() {
            return Err(VsphereError::deadline(self.timeout));
        }
        result
    }

    /// Race `call` against the deadline.
    pub async fn run<T, F>(&self, call: F) -> VsphereResult<T>
    where
        F: Future<Output = VsphereResult<T>>,
    {
        match tokio::time::timeout_at(self.expires_at, call).await {
            Ok(result) => self.check(result),
            Err(_) => Err(VsphereError::deadline(self.timeout)),
        }
    }

    /// Sleep between polls, cut short by the deadline.
    pub async fn sleep(&self, period: Duration) -> VsphereResult<()> {
        self.run(async {
            tokio::time::sleep(period).await;
            Ok(())
        })
        .await
    }
}
