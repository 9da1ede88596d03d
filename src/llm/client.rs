use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::MarkError;
use crate::models::OutputMode;
use crate::pipeline::GradingRequest;

/// Model identifiers the grader is allowed to select from.
pub const SUPPORTED_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-pro", "gemini-2.0-flash"];

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Configuration for the Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key (from GEMINI_API_KEY env var)
    pub api_key: String,
    /// Model to use, drawn from [`SUPPORTED_MODELS`]
    pub model: String,
    /// Temperature (0 = deterministic as the backend allows)
    pub temperature: f64,
    /// Maximum tokens in response
    pub max_output_tokens: u32,
}

impl GeminiConfig {
    /// Create config from environment variables
    pub fn from_env(model: &str) -> Result<Self, MarkError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| MarkError::Config("GEMINI_API_KEY environment variable not set".into()))?;
        Self::new(api_key, model)
    }

    /// Create with an explicit key, rejecting models outside the allow-list
    pub fn new(api_key: String, model: &str) -> Result<Self, MarkError> {
        if !SUPPORTED_MODELS.contains(&model) {
            return Err(MarkError::Config(format!(
                "model {:?} is not supported (choose from {:?})",
                model, SUPPORTED_MODELS
            )));
        }

        Ok(Self {
            api_key,
            model: model.to_string(),
            temperature: 0.0,
            max_output_tokens: 4096,
        })
    }
}

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send one grading request and return the reply text.
    ///
    /// In strict mode the backend is asked for a JSON reply via
    /// `response_mime_type`; the returned string is still raw text and is
    /// parsed by the response parser. Failures are classified: timeouts,
    /// rate limits and server errors are retryable, any other rejection is
    /// not.
    pub async fn generate(
        &self,
        request: &GradingRequest,
        mode: OutputMode,
    ) -> Result<String, MarkError> {
        let mut parts = vec![Part::text(&request.instruction)];
        for payload in &request.payloads {
            parts.push(Part::inline(&payload.mime_type, &payload.bytes));
        }

        let body = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
                response_mime_type: match mode {
                    OutputMode::Strict => Some("application/json".to_string()),
                    OutputMode::Lenient => None,
                },
            },
        };

        let url = format!("{}/{}:generateContent", API_BASE, self.config.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MarkError::BackendUnavailable {
                attempts: 1,
                reason: if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    format!("request failed: {}", e)
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // 429 and 5xx are transient; anything else means the request
            // itself was rejected and retrying cannot succeed.
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(MarkError::BackendUnavailable {
                    attempts: 1,
                    reason: format!("{}: {}", status, body),
                });
            }
            return Err(MarkError::ModelRejected {
                status: status.as_u16(),
                reason: body,
            });
        }

        let response: GenerateResponse =
            response.json().await.map_err(|e| MarkError::ResponseFormat {
                reason: format!("failed to decode API response: {}", e),
            })?;

        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| MarkError::ResponseFormat {
                reason: "no text content in response".to_string(),
            })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inline_data", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    fn inline(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data: BASE64.encode(bytes),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rejects_unknown_model() {
        let result = GeminiConfig::new("key".to_string(), "gpt-4o");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_accepts_supported_model() {
        let config = GeminiConfig::new("key".to_string(), "gemini-2.5-flash").unwrap();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.temperature, 0.0);
    }
}
