//! Active-session state and transcript reconciliation.
//!
//! [`SessionManager`] is the single source of truth for which session is
//! active and what its transcript looks like, and the sole writer to the
//! durable store. All mutation goes through `&mut self`; to share one
//! manager across tasks, wrap it in a `tokio::sync::Mutex` so appends stay
//! serialized.

use crate::store::{CampaignStore, RetryPolicy, StoreError};
use crate::transcript::{is_strictly_ordered, preview, Message, Role, Session};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("no active session - start one with /new or /resume <session-uuid>")]
    NoActiveSession,

    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("transcript for session {uuid} hydrated out of order")]
    InvariantViolation { uuid: Uuid },
}

/// Browser row for the session list.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session: Session,
    pub message_count: usize,

    /// Truncated preview of the most recent utterance.
    pub last_message: Option<String>,
}

/// Preview length for session summaries, in characters.
const PREVIEW_CHARS: usize = 50;

struct ActiveSession {
    session: Session,
    transcript: Vec<Message>,
}

/// Owns the active session and its in-memory transcript.
///
/// At most one session is active per manager instance; the cached
/// transcript is discarded, never reused, when the active session changes.
pub struct SessionManager {
    store: Arc<dyn CampaignStore>,
    retry: RetryPolicy,
    active: Option<ActiveSession>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CampaignStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            active: None,
        }
    }

    /// Set the retry policy for store calls.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The active session, if any.
    pub fn active(&self) -> Option<&Session> {
        self.active.as_ref().map(|a| &a.session)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Read-only snapshot of the active transcript, in creation order.
    pub fn transcript(&self) -> &[Message] {
        self.active
            .as_ref()
            .map(|a| a.transcript.as_slice())
            .unwrap_or(&[])
    }

    /// Create a new session, activate it, and reset the transcript.
    ///
    /// If `seed` is given it becomes the opening system message, persisted
    /// through the normal append path.
    pub async fn start_new(&mut self, seed: Option<&str>) -> Result<Session, SessionError> {
        let session = self.retry.run(|| self.store.create_session()).await?;
        tracing::info!(uuid = %session.uuid, "started new session");

        self.active = Some(ActiveSession {
            session: session.clone(),
            transcript: Vec::new(),
        });

        if let Some(seed) = seed {
            self.append_utterance(Role::System, seed).await?;
        }
        Ok(session)
    }

    /// Rehydrate a previously created session from the store and activate
    /// it.
    ///
    /// Idempotent: resuming the same uuid twice yields identical state and
    /// creates no records. On any failure the current state is unchanged.
    pub async fn resume(&mut self, uuid: Uuid) -> Result<Session, SessionError> {
        let session = self.find_session(uuid).await?;
        let transcript = self
            .retry
            .run(|| self.store.list_messages(session.id))
            .await?;

        if !is_strictly_ordered(&transcript) {
            tracing::error!(uuid = %uuid, "hydrated transcript out of order");
            return Err(SessionError::InvariantViolation { uuid });
        }

        tracing::info!(uuid = %uuid, messages = transcript.len(), "resumed session");
        self.active = Some(ActiveSession {
            session: session.clone(),
            transcript,
        });
        Ok(session)
    }

    /// Append one utterance to the active session.
    ///
    /// The transcript is extended optimistically and the entry is replaced
    /// by the stored record once the durable append succeeds; on failure it
    /// is rolled back, so a later read never sees a message the store does
    /// not hold.
    pub async fn append_utterance(
        &mut self,
        role: Role,
        content: &str,
    ) -> Result<Message, SessionError> {
        let store = Arc::clone(&self.store);
        let retry = self.retry.clone();
        let active = self.active.as_mut().ok_or(SessionError::NoActiveSession)?;
        let session_id = active.session.id;

        active.transcript.push(Message {
            id: 0,
            session_id,
            role,
            content: content.to_string(),
            created_at: String::new(),
        });

        match retry
            .run(|| store.append_message(session_id, role, content))
            .await
        {
            Ok(message) => {
                active.transcript.pop();
                active.transcript.push(message.clone());
                Ok(message)
            }
            Err(e) => {
                active.transcript.pop();
                tracing::warn!(error = %e, role = %role, "durable append failed, rolled back");
                Err(e.into())
            }
        }
    }

    /// Deactivate the current session without deleting data. The cached
    /// transcript is discarded.
    pub fn close_active(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::info!(uuid = %active.session.uuid, "closed active session");
        }
    }

    /// Delete a session and its messages. If the deleted session is the
    /// active one, it is deactivated as well.
    pub async fn delete(&mut self, uuid: Uuid) -> Result<(), SessionError> {
        let session = self.find_session(uuid).await?;

        match self
            .retry
            .run(|| self.store.delete_session(session.id))
            .await
        {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(SessionError::SessionNotFound(uuid)),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(uuid = %uuid, "deleted session");
        let deleted_active = self
            .active
            .as_ref()
            .map(|a| a.session.uuid == uuid)
            .unwrap_or(false);
        if deleted_active {
            self.close_active();
        }
        Ok(())
    }

    /// All sessions, most recent first.
    pub async fn sessions(&self) -> Result<Vec<Session>, SessionError> {
        Ok(self.retry.run(|| self.store.list_sessions()).await?)
    }

    /// Session list enriched with message counts and a preview of the most
    /// recent utterance.
    pub async fn session_summaries(&self) -> Result<Vec<SessionSummary>, SessionError> {
        let sessions = self.sessions().await?;
        let mut summaries = Vec::with_capacity(sessions.len());

        for session in sessions {
            let messages = self
                .retry
                .run(|| self.store.list_messages(session.id))
                .await?;
            summaries.push(SessionSummary {
                message_count: messages.len(),
                last_message: messages.last().map(|m| preview(&m.content, PREVIEW_CHARS)),
                session,
            });
        }
        Ok(summaries)
    }

    async fn find_session(&self, uuid: Uuid) -> Result<Session, SessionError> {
        let sessions = self.retry.run(|| self.store.list_sessions()).await?;
        sessions
            .into_iter()
            .find(|s| s.uuid == uuid)
            .ok_or(SessionError::SessionNotFound(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{BrokenAppendStore, FlakyStore};

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(MemoryStore::new())).with_retry(RetryPolicy::none())
    }

    #[tokio::test]
    async fn test_appends_replay_in_call_order_after_fresh_resume() {
        let mut manager = manager();
        let session = manager.start_new(None).await.unwrap();

        manager
            .append_utterance(Role::User, "first")
            .await
            .unwrap();
        manager
            .append_utterance(Role::Assistant, "second")
            .await
            .unwrap();
        manager
            .append_utterance(Role::User, "third")
            .await
            .unwrap();

        manager.close_active();
        manager.resume(session.uuid).await.unwrap();

        let contents: Vec<_> = manager
            .transcript()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_resume_is_idempotent() {
        let mut manager = manager();
        let session = manager.start_new(Some("seed")).await.unwrap();
        manager.append_utterance(Role::User, "hello").await.unwrap();

        manager.resume(session.uuid).await.unwrap();
        let first: Vec<Message> = manager.transcript().to_vec();

        manager.resume(session.uuid).await.unwrap();
        let second: Vec<Message> = manager.transcript().to_vec();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[tokio::test]
    async fn test_resume_unknown_uuid_fails_and_leaves_state_alone() {
        let mut manager = manager();
        let session = manager.start_new(None).await.unwrap();

        let missing = Uuid::new_v4();
        let result = manager.resume(missing).await;
        assert!(matches!(result, Err(SessionError::SessionNotFound(u)) if u == missing));

        // The previously active session is untouched.
        assert_eq!(manager.active().unwrap().uuid, session.uuid);
    }

    #[tokio::test]
    async fn test_exactly_one_session_active_and_previous_resumable() {
        let mut manager = manager();
        let first = manager.start_new(None).await.unwrap();
        manager
            .append_utterance(Role::User, "in the first campaign")
            .await
            .unwrap();

        let second = manager.start_new(None).await.unwrap();
        assert_eq!(manager.active().unwrap().uuid, second.uuid);
        assert!(manager.transcript().is_empty());

        manager.resume(first.uuid).await.unwrap();
        assert_eq!(manager.transcript().len(), 1);
        assert_eq!(manager.transcript()[0].content, "in the first campaign");
    }

    #[tokio::test]
    async fn test_append_without_active_session_is_guarded() {
        let mut manager = manager();
        let result = manager.append_utterance(Role::User, "into the void").await;
        assert!(matches!(result, Err(SessionError::NoActiveSession)));
    }

    #[tokio::test]
    async fn test_failed_append_rolls_back_the_optimistic_entry() {
        let store = Arc::new(BrokenAppendStore::new(MemoryStore::new()));
        let mut manager =
            SessionManager::new(Arc::clone(&store) as Arc<dyn CampaignStore>)
                .with_retry(RetryPolicy::none());

        // Session creation works; only appends are broken.
        let session = manager.start_new(None).await.unwrap();

        let result = manager.append_utterance(Role::User, "lost turn").await;
        assert!(matches!(result, Err(SessionError::Store(_))));
        assert!(manager.transcript().is_empty());

        // The store agrees after a fresh resume.
        store.heal();
        manager.resume(session.uuid).await.unwrap();
        assert!(manager.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_transient_store_failures_are_retried() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new(), 2));
        let mut manager = SessionManager::new(store).with_retry(RetryPolicy {
            attempts: 3,
            base_delay: std::time::Duration::ZERO,
        });

        // Two injected outages, third attempt lands.
        let session = manager.start_new(None).await.unwrap();
        assert!(manager.active().is_some());
        assert_eq!(manager.active().unwrap().uuid, session.uuid);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_unavailable() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new(), 10));
        let mut manager = SessionManager::new(store).with_retry(RetryPolicy {
            attempts: 2,
            base_delay: std::time::Duration::ZERO,
        });

        let result = manager.start_new(None).await;
        assert!(matches!(
            result,
            Err(SessionError::Store(StoreError::Unavailable(_)))
        ));
        assert!(manager.active().is_none());
    }

    #[tokio::test]
    async fn test_delete_cascades_and_blocks_resume() {
        let mut manager = manager();
        let session = manager.start_new(None).await.unwrap();
        manager.append_utterance(Role::User, "doomed").await.unwrap();

        manager.delete(session.uuid).await.unwrap();
        assert!(!manager.is_active());

        let result = manager.resume(session.uuid).await;
        assert!(matches!(result, Err(SessionError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_of_inactive_session_keeps_active_one() {
        let mut manager = manager();
        let doomed = manager.start_new(None).await.unwrap();
        let kept = manager.start_new(None).await.unwrap();

        manager.delete(doomed.uuid).await.unwrap();
        assert_eq!(manager.active().unwrap().uuid, kept.uuid);
    }

    #[tokio::test]
    async fn test_close_active_keeps_data_but_discards_cache() {
        let mut manager = manager();
        let session = manager.start_new(None).await.unwrap();
        manager.append_utterance(Role::User, "kept").await.unwrap();

        manager.close_active();
        assert!(!manager.is_active());
        assert!(manager.transcript().is_empty());

        manager.resume(session.uuid).await.unwrap();
        assert_eq!(manager.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_seeded_session_starts_with_system_message() {
        let mut manager = manager();
        manager.start_new(Some("You are the Game Master.")).await.unwrap();

        let transcript = manager.transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].role, Role::System);
        assert_eq!(transcript[0].content, "You are the Game Master.");
    }

    #[tokio::test]
    async fn test_session_summaries_count_and_preview() {
        let mut manager = manager();
        let chatty = manager.start_new(None).await.unwrap();
        manager.append_utterance(Role::User, "hello").await.unwrap();
        manager
            .append_utterance(Role::Assistant, &"x".repeat(80))
            .await
            .unwrap();
        let quiet = manager.start_new(None).await.unwrap();

        let summaries = manager.session_summaries().await.unwrap();
        assert_eq!(summaries.len(), 2);

        // Most recent first.
        assert_eq!(summaries[0].session.uuid, quiet.uuid);
        assert_eq!(summaries[0].message_count, 0);
        assert!(summaries[0].last_message.is_none());

        assert_eq!(summaries[1].session.uuid, chatty.uuid);
        assert_eq!(summaries[1].message_count, 2);
        let preview = summaries[1].last_message.as_deref().unwrap();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 53);
    }

    #[tokio::test]
    async fn test_managers_do_not_share_state() {
        let store = Arc::new(MemoryStore::new());
        let mut first =
            SessionManager::new(Arc::clone(&store) as Arc<dyn CampaignStore>);
        let mut second = SessionManager::new(store);

        let session = first.start_new(None).await.unwrap();
        assert!(second.active().is_none());

        // Both see the same durable data, each with its own active pointer.
        second.resume(session.uuid).await.unwrap();
        first.close_active();
        assert!(second.is_active());
    }
}
