//! Durable-store gateway.
//!
//! The store is an external relational service holding two record kinds,
//! sessions and messages. This module wraps its primitives behind the
//! narrow [`CampaignStore`] capability and a small error taxonomy; callers
//! never see the wire protocol.

use crate::transcript::{Message, Role, Session};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient failure; safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Precondition violation (e.g. appending to a deleted session); never
    /// retried.
    #[error("store conflict: {0}")]
    Conflict(String),

    #[error("record not found")]
    NotFound,

    /// The store replied with something this gateway cannot decode.
    #[error("malformed store reply: {0}")]
    Malformed(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Capability interface over the durable store.
///
/// Implementations must preserve insertion order: `list_messages` returns
/// entries in exactly the order `append_message` was called, and appends are
/// never reordered or batched.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Allocate a new session (id, uuid, timestamp) atomically.
    async fn create_session(&self) -> Result<Session, StoreError>;

    /// Append one utterance record. Call once per logical utterance, in the
    /// exact order utterances occur.
    async fn append_message(
        &self,
        session_id: i64,
        role: Role,
        content: &str,
    ) -> Result<Message, StoreError>;

    /// All sessions, most recent first.
    async fn list_sessions(&self) -> Result<Vec<Session>, StoreError>;

    /// All messages of one session in creation order. The canonical resume
    /// path.
    async fn list_messages(&self, session_id: i64) -> Result<Vec<Message>, StoreError>;

    /// Delete a session and, via the store's cascade, all of its messages.
    async fn delete_session(&self, session_id: i64) -> Result<(), StoreError>;
}

/// Bounded retry with exponential backoff for transient store failures.
///
/// Only [`StoreError::Unavailable`] is retried; conflicts and missing
/// records surface immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,

    /// Delay before the first retry; doubles after each failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Run `op`, retrying on `Unavailable` until the attempt budget is
    /// spent.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let attempts = self.attempts.max(1);
        let mut delay = self.base_delay;

        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    tracing::warn!(attempt, error = %e, "store call failed, retrying");
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }

        unreachable!("retry loop returns on the last attempt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            base_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let calls = AtomicU32::new(0);

        let result = fast_policy(3)
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(StoreError::Unavailable("outage".to_string()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = fast_policy(3)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StoreError::Unavailable("outage".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_conflict_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = fast_policy(5)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StoreError::Conflict("double delete".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = fast_policy(5)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StoreError::NotFound) }
            })
            .await;

        assert!(matches!(result, Err(StoreError::NotFound)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
