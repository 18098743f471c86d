//! PostgREST-backed store implementation.
//!
//! Speaks to a Supabase-style data API with two tables:
//! `sessions(id, session_uuid, created_at)` and
//! `messages(id, session_id, role, content, created_at)` with cascade
//! delete from sessions to messages. Messages are ordered by the
//! auto-incrementing `id` column, never by timestamp.

use super::{CampaignStore, StoreError};
use crate::config::Config;
use crate::transcript::{Message, Role, Session};
use async_trait::async_trait;
use postgrest::{Postgrest, Query};
use serde::de::DeserializeOwned;
use serde_json::json;

/// A [`CampaignStore`] backed by a PostgREST data API.
#[derive(Clone)]
pub struct RestStore {
    client: Postgrest,
}

impl RestStore {
    pub fn new(client: Postgrest) -> Self {
        Self { client }
    }

    /// Build a store from resolved configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Postgrest::new(&config.supabase_url, &config.supabase_key))
    }
}

#[async_trait]
impl CampaignStore for RestStore {
    async fn create_session(&self) -> Result<Session, StoreError> {
        let rows = self
            .client
            .insert("sessions", &json!({}))
            .await
            .map_err(map_err)?;
        decode_single(rows)
    }

    async fn append_message(
        &self,
        session_id: i64,
        role: Role,
        content: &str,
    ) -> Result<Message, StoreError> {
        let rows = self
            .client
            .insert(
                "messages",
                &json!({
                    "session_id": session_id,
                    "role": role.as_str(),
                    "content": content,
                }),
            )
            .await
            .map_err(map_err)?;
        decode_single(rows)
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        let rows = self
            .client
            .select(
                "sessions",
                Query::new().select("*").order("created_at.desc,id.desc"),
            )
            .await
            .map_err(map_err)?;
        rows.into_iter().map(decode).collect()
    }

    async fn list_messages(&self, session_id: i64) -> Result<Vec<Message>, StoreError> {
        let rows = self
            .client
            .select(
                "messages",
                Query::new()
                    .select("*")
                    .eq("session_id", session_id)
                    .order("id.asc"),
            )
            .await
            .map_err(map_err)?;
        rows.into_iter().map(decode).collect()
    }

    async fn delete_session(&self, session_id: i64) -> Result<(), StoreError> {
        let rows = self
            .client
            .delete("sessions", Query::new().eq("id", session_id))
            .await
            .map_err(map_err)?;

        // With return=representation an empty reply means nothing matched.
        if rows.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(row: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(row).map_err(|e| StoreError::Malformed(e.to_string()))
}

fn decode_single<T: DeserializeOwned>(rows: Vec<serde_json::Value>) -> Result<T, StoreError> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::Malformed("insert returned no row".to_string()))?;
    decode(row)
}

fn map_err(e: postgrest::Error) -> StoreError {
    match e {
        postgrest::Error::Network(m) => StoreError::Unavailable(m),
        postgrest::Error::Api { status, message } => match status {
            404 => StoreError::NotFound,
            409 => StoreError::Conflict(message),
            429 => StoreError::Unavailable(format!("rate limited: {message}")),
            s if s >= 500 => StoreError::Unavailable(format!("status {s}: {message}")),
            s => StoreError::Conflict(format!("status {s}: {message}")),
        },
        postgrest::Error::Parse(m) => StoreError::Malformed(m),
        other => StoreError::Unavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_row_decoding() {
        let row = json!({
            "id": 12,
            "session_id": 3,
            "role": "assistant",
            "content": "A creaking hinge...",
            "created_at": "2025-06-01T12:00:05+00:00"
        });

        let message: Message = decode(row).unwrap();
        assert_eq!(message.id, 12);
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "A creaking hinge...");
    }

    #[test]
    fn test_legacy_row_decoding() {
        // Rows written by the pre-rewrite system tagged replies as "model".
        let row = json!({
            "id": 1,
            "session_id": 1,
            "role": "model",
            "content": "Welcome, adventurer.",
            "created_at": "2025-01-01T00:00:00+00:00"
        });

        let message: Message = decode(row).unwrap();
        assert_eq!(message.role, Role::Assistant);
    }

    #[test]
    fn test_undecodable_row_is_malformed() {
        let row = json!({"id": "not a number"});
        let result: Result<Message, _> = decode(row);
        assert!(matches!(result, Err(StoreError::Malformed(_))));
    }

    #[test]
    fn test_insert_without_row_is_malformed() {
        let result: Result<Session, _> = decode_single(vec![]);
        assert!(matches!(result, Err(StoreError::Malformed(_))));
    }

    #[test]
    fn test_error_mapping() {
        let unavailable = map_err(postgrest::Error::Network("refused".to_string()));
        assert!(unavailable.is_retryable());

        let conflict = map_err(postgrest::Error::Api {
            status: 409,
            message: "fk violation".to_string(),
        });
        assert!(matches!(conflict, StoreError::Conflict(_)));
        assert!(!conflict.is_retryable());

        let server = map_err(postgrest::Error::Api {
            status: 503,
            message: "maintenance".to_string(),
        });
        assert!(server.is_retryable());

        assert!(matches!(
            map_err(postgrest::Error::Api {
                status: 404,
                message: String::new(),
            }),
            StoreError::NotFound
        ));
    }
}
