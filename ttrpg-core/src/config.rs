//! Environment-driven configuration.
//!
//! Everything is resolved once at startup; missing required values fail
//! fast with the variable name. The binary loads `.env` before calling
//! [`Config::from_env`].

use crate::store::RetryPolicy;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set - add it to your environment or .env file")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Scenario seed used when TTRPG_SCENARIO is not set.
///
/// Abridged Game Master persona; the full campaign rules emerge in play.
pub const DEFAULT_SCENARIO_SEED: &str = "\
You are an advanced AI Game Master for an immersive Dungeons & \
Dragons-style tabletop role-playing game. You describe the world, its \
inhabitants, and the consequences of player actions; you interpret rules, \
adjudicate outcomes, and drive the evolving narrative. Your narration is \
vivid and immersive, player choices are paramount, and you adjudicate \
impartially. Deliver each turn as a single cohesive narrative block ending \
with a prompt for the player's next action. When a skill check is needed, \
ask the player to roll; never roll dice yourself - roll results arrive as \
dedicated transcript entries. Never generate explicit, hateful, or \
dangerous content.\n\n\
IMPORTANT: Your first task is to greet the player and ask two questions. \
First, ask if they have a specific scenario in mind or if you should \
create one. Second, ask if they want to define their character or if you \
should create one for them. Do not generate a story, characters, or rules \
until they have answered.";

/// Runtime configuration for the interactive client.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key.
    pub gemini_api_key: String,

    /// Optional Gemini model override.
    pub gemini_model: Option<String>,

    /// Base URL of the Supabase/PostgREST store.
    pub supabase_url: String,

    /// API key for the store.
    pub supabase_key: String,

    /// System message seeding every new session.
    pub scenario_seed: String,

    /// Deadline for one Game Master call.
    pub agent_timeout: Duration,

    /// Total store attempts, including the first.
    pub store_retries: u32,

    /// Delay before the first store retry; doubles per retry.
    pub store_backoff: Duration,

    /// Session to resume automatically at startup.
    pub auto_resume: Option<Uuid>,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            gemini_api_key: require("GEMINI_API_KEY")?,
            gemini_model: optional("GEMINI_MODEL"),
            supabase_url: require("SUPABASE_URL")?,
            supabase_key: require("SUPABASE_KEY")?,
            scenario_seed: optional("TTRPG_SCENARIO")
                .unwrap_or_else(|| DEFAULT_SCENARIO_SEED.to_string()),
            agent_timeout: Duration::from_secs(parse_or("TTRPG_AGENT_TIMEOUT_SECS", 120)?),
            store_retries: parse_or("TTRPG_STORE_RETRIES", 3)?,
            store_backoff: Duration::from_millis(parse_or("TTRPG_STORE_BACKOFF_MS", 250)?),
            auto_resume: parse_uuid("TTRPG_RESUME_SESSION")?,
        })
    }

    /// Retry policy for store calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.store_retries.max(1),
            base_delay: self.store_backoff,
        }
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn parse_uuid(name: &'static str) -> Result<Option<Uuid>, ConfigError> {
    match optional(name) {
        Some(value) => Uuid::parse_str(value.trim())
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scenario_seed_asks_before_playing() {
        assert!(DEFAULT_SCENARIO_SEED.contains("Game Master"));
        assert!(DEFAULT_SCENARIO_SEED.contains("Do not generate a story"));
    }

    #[test]
    fn test_parse_or_uses_default_when_unset() {
        let value: u64 = parse_or("TTRPG_TEST_UNSET_VARIABLE", 120).unwrap();
        assert_eq!(value, 120);
    }

    #[test]
    fn test_parse_or_rejects_garbage() {
        std::env::set_var("TTRPG_TEST_GARBAGE_TIMEOUT", "soon");
        let result: Result<u64, _> = parse_or("TTRPG_TEST_GARBAGE_TIMEOUT", 120);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
        std::env::remove_var("TTRPG_TEST_GARBAGE_TIMEOUT");
    }

    #[test]
    fn test_parse_uuid_rejects_garbage() {
        std::env::set_var("TTRPG_TEST_GARBAGE_UUID", "not-a-uuid");
        assert!(matches!(
            parse_uuid("TTRPG_TEST_GARBAGE_UUID"),
            Err(ConfigError::Invalid { .. })
        ));
        std::env::remove_var("TTRPG_TEST_GARBAGE_UUID");
    }

    #[test]
    fn test_retry_policy_mapping() {
        let config = Config {
            gemini_api_key: "key".to_string(),
            gemini_model: None,
            supabase_url: "https://example.supabase.co".to_string(),
            supabase_key: "key".to_string(),
            scenario_seed: DEFAULT_SCENARIO_SEED.to_string(),
            agent_timeout: Duration::from_secs(30),
            store_retries: 0,
            store_backoff: Duration::from_millis(10),
            auto_resume: None,
        };

        // A zero retry count still means one attempt.
        assert_eq!(config.retry_policy().attempts, 1);
    }

    #[test]
    fn test_require_treats_blank_as_missing() {
        std::env::set_var("TTRPG_TEST_BLANK_VARIABLE", "   ");
        assert!(matches!(
            require("TTRPG_TEST_BLANK_VARIABLE"),
            Err(ConfigError::Missing(_))
        ));
        std::env::remove_var("TTRPG_TEST_BLANK_VARIABLE");
    }
}
