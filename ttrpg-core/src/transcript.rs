//! Transcript data model.
//!
//! A transcript is the ordered log of role-tagged utterances belonging to
//! one session. Ordering is determined by the store-assigned surrogate id,
//! which follows insertion order regardless of timestamp granularity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Author of a transcript entry.
///
/// `System` entries seed scenario context and carry dice narration; they are
/// fed to the narrator verbatim but are not dialogue turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    /// Rows written by earlier versions of the system used the Gemini role
    /// name for this variant.
    #[serde(alias = "model")]
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session record as the durable store holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Store-assigned surrogate key.
    pub id: i64,

    /// Client-visible stable identifier, used in all user-facing references.
    #[serde(rename = "session_uuid")]
    pub uuid: Uuid,

    /// Store-assigned creation timestamp, immutable.
    pub created_at: String,
}

/// One persisted utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned surrogate key; monotonically increasing within a
    /// session, and the ordering source of truth.
    pub id: i64,

    /// Owning session. A message belongs to one session forever.
    pub session_id: i64,

    pub role: Role,

    pub content: String,

    pub created_at: String,
}

/// Check that hydrated messages arrived in strict insertion order.
pub fn is_strictly_ordered(messages: &[Message]) -> bool {
    messages.windows(2).all(|pair| pair[0].id < pair[1].id)
}

/// Unicode-safe truncation for session-browser previews.
pub fn preview(content: &str, max_chars: usize) -> String {
    let char_count = content.chars().count();
    if char_count > max_chars {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        content.to_string()
    }
}
