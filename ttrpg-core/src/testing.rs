//! Testing utilities.
//!
//! Deterministic doubles for the narrator seam and fault-injecting store
//! wrappers, so lifecycle behavior can be tested without API calls.

use crate::narrator::{Narrator, NarratorError};
use crate::store::{CampaignStore, StoreError};
use crate::transcript::{Message, Role, Session};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A narrator that replays scripted replies in order.
///
/// Once the script is exhausted it falls back to a fixed line, so tests
/// never hang on a missing expectation.
pub struct ScriptedNarrator {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedNarrator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }

    /// Add a reply to the end of the script.
    pub fn queue_reply(&self, reply: impl Into<String>) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply.into());
    }
}

#[async_trait]
impl Narrator for ScriptedNarrator {
    async fn narrate(&self, _transcript: &[Message]) -> Result<String, NarratorError> {
        let next = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Ok(next.unwrap_or_else(|| "The Game Master has no more scripted replies.".to_string()))
    }
}

/// A narrator that always fails with an API error.
pub struct FailingNarrator;

#[async_trait]
impl Narrator for FailingNarrator {
    async fn narrate(&self, _transcript: &[Message]) -> Result<String, NarratorError> {
        Err(NarratorError::Api(gemini::Error::Api {
            status: 503,
            message: "scripted failure".to_string(),
        }))
    }
}

/// A narrator that takes `delay` to answer under a `timeout` deadline,
/// producing a real [`NarratorError::Timeout`] when the deadline is
/// shorter.
pub struct SlowNarrator {
    pub delay: Duration,
    pub timeout: Duration,
}

#[async_trait]
impl Narrator for SlowNarrator {
    async fn narrate(&self, _transcript: &[Message]) -> Result<String, NarratorError> {
        tokio::time::timeout(self.timeout, tokio::time::sleep(self.delay))
            .await
            .map_err(|_| NarratorError::Timeout(self.timeout))?;
        Ok("The Game Master finally responds.".to_string())
    }
}

/// Store wrapper that fails the next `failures` calls with `Unavailable`,
/// then delegates.
pub struct FlakyStore<S> {
    inner: S,
    failures: AtomicUsize,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }

    fn take_failure(&self) -> Result<(), StoreError> {
        let mut remaining = self.failures.load(Ordering::SeqCst);
        while remaining > 0 {
            match self.failures.compare_exchange(
                remaining,
                remaining - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Err(StoreError::Unavailable("injected outage".to_string())),
                Err(actual) => remaining = actual,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<S: CampaignStore> CampaignStore for FlakyStore<S> {
    async fn create_session(&self) -> Result<Session, StoreError> {
        self.take_failure()?;
        self.inner.create_session().await
    }

    async fn append_message(
        &self,
        session_id: i64,
        role: Role,
        content: &str,
    ) -> Result<Message, StoreError> {
        self.take_failure()?;
        self.inner.append_message(session_id, role, content).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        self.take_failure()?;
        self.inner.list_sessions().await
    }

    async fn list_messages(&self, session_id: i64) -> Result<Vec<Message>, StoreError> {
        self.take_failure()?;
        self.inner.list_messages(session_id).await
    }

    async fn delete_session(&self, session_id: i64) -> Result<(), StoreError> {
        self.take_failure()?;
        self.inner.delete_session(session_id).await
    }
}

/// Store wrapper whose appends fail terminally until [`heal`] is called.
/// Every other operation delegates, which makes it ideal for rollback
/// tests.
///
/// [`heal`]: BrokenAppendStore::heal
pub struct BrokenAppendStore<S> {
    inner: S,
    broken: AtomicBool,
}

impl<S> BrokenAppendStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            broken: AtomicBool::new(true),
        }
    }

    /// Let appends through again.
    pub fn heal(&self) {
        self.broken.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: CampaignStore> CampaignStore for BrokenAppendStore<S> {
    async fn create_session(&self) -> Result<Session, StoreError> {
        self.inner.create_session().await
    }

    async fn append_message(
        &self,
        session_id: i64,
        role: Role,
        content: &str,
    ) -> Result<Message, StoreError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(StoreError::Conflict("injected append failure".to_string()));
        }
        self.inner.append_message(session_id, role, content).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        self.inner.list_sessions().await
    }

    async fn list_messages(&self, session_id: i64) -> Result<Vec<Message>, StoreError> {
        self.inner.list_messages(session_id).await
    }

    async fn delete_session(&self, session_id: i64) -> Result<(), StoreError> {
        self.inner.delete_session(session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_scripted_narrator_replays_in_order() {
        let narrator = ScriptedNarrator::new(["one", "two"]);
        assert_eq!(narrator.narrate(&[]).await.unwrap(), "one");
        assert_eq!(narrator.narrate(&[]).await.unwrap(), "two");
        assert!(narrator
            .narrate(&[])
            .await
            .unwrap()
            .contains("no more scripted"));
    }

    #[tokio::test]
    async fn test_scripted_narrator_queue() {
        let narrator = ScriptedNarrator::new(Vec::<String>::new());
        narrator.queue_reply("later");
        assert_eq!(narrator.narrate(&[]).await.unwrap(), "later");
    }

    #[tokio::test]
    async fn test_flaky_store_recovers() {
        let store = FlakyStore::new(MemoryStore::new(), 1);
        assert!(store.create_session().await.is_err());
        assert!(store.create_session().await.is_ok());
    }

    #[tokio::test]
    async fn test_slow_narrator_times_out() {
        let narrator = SlowNarrator {
            delay: Duration::from_millis(50),
            timeout: Duration::from_millis(5),
        };
        assert!(matches!(
            narrator.narrate(&[]).await,
            Err(NarratorError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_broken_append_store_heals() {
        let store = BrokenAppendStore::new(MemoryStore::new());
        let session = store.create_session().await.unwrap();

        assert!(store
            .append_message(session.id, Role::User, "lost")
            .await
            .is_err());

        store.heal();
        assert!(store
            .append_message(session.id, Role::User, "kept")
            .await
            .is_ok());
    }
}
