//! Bounded retry for idempotent backend calls.
//!
//! Only operations the caller knows to be idempotent — existence checks
//! and reads — go through the policy. Uploads and deletes are invoked
//! exactly once: repeating a half-applied write blind risks double side
//! effects, so their first failure surfaces to the caller of the whole
//! adapter. Each `run` owns its attempt counter and delay; nothing is
//! shared between calls.

use std::future::Future;
use std::time::Duration;

use crate::backend::BackendError;

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Invoke `call` until it succeeds, fails with a non-transient
    /// error, or the attempt ceiling is reached. Exhausting the ceiling
    /// surfaces the last transient error as-is.
    pub async fn run<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    tracing::warn!(
                        op,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "transient object storage failure, retrying"
                    );
                    tokio::time::sleep(self.base_delay * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        // No delay so the ceiling tests stay fast.
        RetryPolicy::new(3, Duration::from_millis(0))
    }

    #[tokio::test]
    async fn not_found_is_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy()
            .run("head", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(BackendError::Status { status: 404, message: "missing".into() })
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().status(), Some(404));
    }

    #[tokio::test]
    async fn server_error_retries_to_the_ceiling_then_surfaces_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy()
            .run("head", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(BackendError::Status { status: 500, message: "boom".into() })
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap_err().status(), Some(500));
    }

    #[tokio::test]
    async fn transient_failure_then_success_recovers() {
        let calls = AtomicU32::new(0);
        let result = policy()
            .run("get", || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(BackendError::Transport("connection reset".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rate_limiting_is_transient_but_other_4xx_are_not() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy()
            .run("get", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(BackendError::Status { status: 403, message: "denied".into() })
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().status(), Some(403));

        assert!(BackendError::Status { status: 429, message: String::new() }.is_transient());
    }
}
