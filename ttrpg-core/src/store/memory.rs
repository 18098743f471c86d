//! In-process store implementation.
//!
//! Backs the test suite and any offline use. Ids are allocated from
//! monotonic counters, so insertion order is recoverable without consulting
//! timestamps, exactly like the relational store's auto-incrementing keys.

use super::{CampaignStore, StoreError};
use crate::transcript::{Message, Role, Session};
use async_trait::async_trait;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Inner {
    next_session_id: i64,
    next_message_id: i64,
    sessions: Vec<Session>,
    messages: Vec<Message>,
}

/// An in-memory [`CampaignStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-mutation; tests should see it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CampaignStore for MemoryStore {
    async fn create_session(&self) -> Result<Session, StoreError> {
        let mut inner = self.lock();
        inner.next_session_id += 1;
        let session = Session {
            id: inner.next_session_id,
            uuid: Uuid::new_v4(),
            created_at: now_stamp(),
        };
        inner.sessions.push(session.clone());
        Ok(session)
    }

    async fn append_message(
        &self,
        session_id: i64,
        role: Role,
        content: &str,
    ) -> Result<Message, StoreError> {
        let mut inner = self.lock();
        if !inner.sessions.iter().any(|s| s.id == session_id) {
            return Err(StoreError::Conflict(format!(
                "session {session_id} does not exist"
            )));
        }

        inner.next_message_id += 1;
        let message = Message {
            id: inner.next_message_id,
            session_id,
            role,
            content: content.to_string(),
            created_at: now_stamp(),
        };
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        let inner = self.lock();
        let mut sessions = inner.sessions.clone();
        // Ids follow creation order, so this is created_at descending
        // without timestamp-tie ambiguity.
        sessions.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(sessions)
    }

    async fn list_messages(&self, session_id: i64) -> Result<Vec<Message>, StoreError> {
        let inner = self.lock();
        if !inner.sessions.iter().any(|s| s.id == session_id) {
            return Err(StoreError::NotFound);
        }

        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(messages)
    }

    async fn delete_session(&self, session_id: i64) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let before = inner.sessions.len();
        inner.sessions.retain(|s| s.id != session_id);
        if inner.sessions.len() == before {
            return Err(StoreError::NotFound);
        }

        // Cascade, matching the relational schema's ON DELETE CASCADE.
        inner.messages.retain(|m| m.session_id != session_id);
        Ok(())
    }
}

/// Current timestamp as unix seconds.
fn now_stamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", now.as_secs())
}
