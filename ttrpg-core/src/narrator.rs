//! The generative Game Master seam.
//!
//! A narrator consumes an ordered transcript and produces the next
//! assistant utterance. The production implementation calls Gemini; tests
//! use the scripted doubles in [`crate::testing`].

use crate::config::Config;
use crate::transcript::{Message, Role};
use async_trait::async_trait;
use gemini::{Content, Gemini, Request};
use std::time::Duration;
use thiserror::Error;

/// Errors from the narrator.
#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("Game Master API error: {0}")]
    Api(#[from] gemini::Error),

    #[error("Game Master timed out after {0:?}")]
    Timeout(Duration),

    #[error("Game Master returned an empty reply")]
    EmptyReply,
}

/// Something that can narrate the next turn.
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Produce the next assistant utterance for an ordered transcript.
    async fn narrate(&self, transcript: &[Message]) -> Result<String, NarratorError>;
}

/// Configuration for the Gemini-backed narrator.
#[derive(Debug, Clone)]
pub struct NarratorConfig {
    /// Model override; `None` uses the client default.
    pub model: Option<String>,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Per-call deadline.
    pub timeout: Duration,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: Some(0.7),
            timeout: Duration::from_secs(120),
        }
    }
}

/// The Gemini-backed Game Master.
pub struct GeminiNarrator {
    client: Gemini,
    config: NarratorConfig,
}

impl GeminiNarrator {
    pub fn new(client: Gemini) -> Self {
        Self {
            client,
            config: NarratorConfig::default(),
        }
    }

    /// Create a narrator from the GEMINI_API_KEY environment variable.
    pub fn from_env() -> Result<Self, NarratorError> {
        Ok(Self::new(Gemini::from_env()?))
    }

    /// Build a narrator from resolved configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Gemini::new(&config.gemini_api_key)).with_config(NarratorConfig {
            model: config.gemini_model.clone(),
            timeout: config.agent_timeout,
            ..NarratorConfig::default()
        })
    }

    pub fn with_config(mut self, config: NarratorConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl Narrator for GeminiNarrator {
    async fn narrate(&self, transcript: &[Message]) -> Result<String, NarratorError> {
        let mut request = Request::new(to_contents(transcript));
        if let Some(ref model) = self.config.model {
            request = request.with_model(model);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }

        let started = std::time::Instant::now();
        let response = tokio::time::timeout(self.config.timeout, self.client.generate(request))
            .await
            .map_err(|_| NarratorError::Timeout(self.config.timeout))??;
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "narrator replied"
        );

        let text = response.text.trim().to_string();
        if text.is_empty() {
            return Err(NarratorError::EmptyReply);
        }
        Ok(text)
    }
}

/// Map transcript roles onto Gemini's two-role vocabulary. Scenario seeds
/// and dice narration travel as `user` turns alongside player input; only
/// assistant replies are `model` turns.
fn to_contents(transcript: &[Message]) -> Vec<Content> {
    transcript
        .iter()
        .map(|m| match m.role {
            Role::Assistant => Content::model(m.content.clone()),
            Role::System | Role::User => Content::user(m.content.clone()),
        })
        .collect()
}
