//! Minimal Google Gemini API client.
//!
//! This crate provides a focused client for Gemini's `generateContent`
//! endpoint: role-tagged conversation contents in, one narrative reply out.
//! No streaming, no tool use.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use thiserror::Error;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";

/// Errors that can occur when using the Gemini client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Response contained no candidates")]
    NoCandidates,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Role of a conversation turn, in Gemini's wire vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One text fragment of a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// A role-tagged conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    /// A user-authored turn with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part { text: text.into() }],
        }
    }

    /// A model-authored turn with a single text part.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part { text: text.into() }],
        }
    }

    /// Concatenated text of all parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A generation request.
#[derive(Debug, Clone)]
pub struct Request {
    pub contents: Vec<Content>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

impl Request {
    /// Create a request from ordered conversation contents.
    pub fn new(contents: Vec<Content>) -> Self {
        Self {
            contents,
            model: None,
            temperature: None,
        }
    }

    /// Override the model for this request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A completed generation.
#[derive(Debug, Clone)]
pub struct Response {
    /// Concatenated text of the first candidate.
    pub text: String,

    /// Finish reason reported by the API, if any.
    pub finish_reason: Option<String>,
}

/// Gemini API client.
#[derive(Clone)]
pub struct Gemini {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl Gemini {
    /// Create a new Gemini client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a Gemini client from the GEMINI_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| Error::NoApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Send a generation request and return the full response.
    pub async fn generate(&self, request: Request) -> Result<Response, Error> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let url = format!("{API_BASE}/models/{model}:generateContent");

        let api_request = ApiRequest {
            contents: &request.contents,
            generation_config: request.temperature.map(|temperature| GenerationConfig {
                temperature,
            }),
        };

        let response = self
            .client
            .post(url)
            .headers(self.build_headers()?)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        let candidate = api_response
            .candidates
            .into_iter()
            .next()
            .ok_or(Error::NoCandidates)?;

        Ok(Response {
            text: candidate.content.text(),
            finish_reason: candidate.finish_reason,
        })
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        Ok(headers)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    content: Content,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), "\"model\"");
    }

    #[test]
    fn test_content_constructors() {
        let user = Content::user("I open the door");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.text(), "I open the door");

        let model = Content::model("A creaking hinge...");
        assert_eq!(model.role, Role::Model);
    }

    #[test]
    fn test_request_serialization() {
        let request = Request::new(vec![Content::user("hello")]).with_temperature(0.7);
        let api_request = ApiRequest {
            contents: &request.contents,
            generation_config: request.temperature.map(|temperature| GenerationConfig {
                temperature,
            }),
        };

        let json = serde_json::to_value(&api_request).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["generationConfig"]["temperature"], 0.7);
    }

    #[test]
    fn test_request_omits_empty_generation_config() {
        let request = Request::new(vec![Content::user("hi")]);
        let api_request = ApiRequest {
            contents: &request.contents,
            generation_config: None,
        };

        let json = serde_json::to_value(&api_request).unwrap();
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let raw = serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "The tavern falls silent."}]
                },
                "finishReason": "STOP"
            }]
        });

        let parsed: ApiResponse = serde_json::from_value(raw).unwrap();
        let candidate = parsed.candidates.into_iter().next().unwrap();
        assert_eq!(candidate.content.text(), "The tavern falls silent.");
        assert_eq!(candidate.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_empty_candidates() {
        let raw = serde_json::json!({});
        let parsed: ApiResponse = serde_json::from_value(raw).unwrap();
        assert!(parsed.candidates.is_empty());
    }

    #[test]
    fn test_multi_part_text() {
        let content = Content {
            role: Role::Model,
            parts: vec![
                Part {
                    text: "First.".to_string(),
                },
                Part {
                    text: "Second.".to_string(),
                },
            ],
        };
        assert_eq!(content.text(), "First.\nSecond.");
    }
}
