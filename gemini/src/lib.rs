//! Minimal Google Gemini API client.
//!
//! This crate provides a focused client for Gemini's `generateContent` API
//! with:
//! - Multi-turn content generation with a system instruction
//! - Structured JSON output via response schemas
//! - Speech synthesis (audio response modality) returning base64 PCM

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";
const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";

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

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Gemini API client.
#[derive(Clone)]
pub struct Gemini {
    client: reqwest::Client,
    api_key: String,
    model: String,
    speech_model: String,
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
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
        }
    }

    /// Create a Gemini client from the GEMINI_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| Error::NoApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set the default generation model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the speech synthesis model for this client.
    pub fn with_speech_model(mut self, model: impl Into<String>) -> Self {
        self.speech_model = model.into();
        self
    }

    /// Send a generation request and return the full response.
    pub async fn generate(&self, request: Request) -> Result<Response, Error> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let api_request = build_api_request(&request);
        let api_response = self.post_generate(&model, &api_request).await?;
        parse_response(api_response)
    }

    /// Synthesize speech for the given text.
    ///
    /// Returns the base64-encoded raw PCM payload produced by the model.
    pub async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse, Error> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.speech_model.clone());
        let api_request = build_speech_request(&request);
        let api_response = self.post_generate(&model, &api_request).await?;
        let response = parse_response(api_response)?;
        extract_speech(response)
    }

    async fn post_generate(
        &self,
        model: &str,
        api_request: &ApiRequest,
    ) -> Result<ApiResponse, Error> {
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(format!("{API_BASE}/models/{model}:generateContent"))
            .headers(headers)
            .json(api_request)
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

        response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        Ok(headers)
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A generation request to send to Gemini.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: Option<String>,
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    pub temperature: Option<f32>,
    /// When set, the response is constrained to JSON matching this schema.
    pub response_schema: Option<serde_json::Value>,
}

impl Request {
    /// Create a new request with the given conversation contents.
    pub fn new(contents: Vec<Content>) -> Self {
        Self {
            model: None,
            system_instruction: None,
            contents,
            temperature: None,
            response_schema: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_instruction = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// A speech synthesis request.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub model: Option<String>,
    pub text: String,
    pub voice: String,
}

impl SpeechRequest {
    /// Create a speech request for the given text and prebuilt voice name.
    pub fn new(text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            model: None,
            text: text.into(),
            voice: voice.into(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// One turn of conversation content.
#[derive(Debug, Clone)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    /// Create a user turn with text content.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text { text: text.into() }],
        }
    }

    /// Create a model turn with text content.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text { text: text.into() }],
        }
    }
}

/// The role of a content turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// A part of a content turn.
#[derive(Debug, Clone)]
pub enum Part {
    Text {
        text: String,
    },
    /// Inline binary payload (base64-encoded), e.g. synthesized audio.
    InlineData {
        mime_type: String,
        data: String,
    },
}

/// A generation response from Gemini.
#[derive(Debug, Clone)]
pub struct Response {
    pub parts: Vec<Part>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl Response {
    /// Get all text parts concatenated.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                Part::InlineData { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Get the first inline data part, if any.
    pub fn inline_data(&self) -> Option<(&str, &str)> {
        self.parts.iter().find_map(|part| match part {
            Part::InlineData { mime_type, data } => Some((mime_type.as_str(), data.as_str())),
            Part::Text { .. } => None,
        })
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Other,
}

/// Token usage information.
#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub response_tokens: usize,
}

/// Synthesized speech payload.
#[derive(Debug, Clone)]
pub struct SpeechResponse {
    pub mime_type: String,
    /// Base64-encoded raw PCM bytes.
    pub data: String,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<ApiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<ApiInlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<ApiSpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiSpeechConfig {
    voice_config: ApiVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiVoiceConfig {
    prebuilt_voice_config: ApiPrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiPrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: Option<ApiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    content: Option<ApiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ApiUsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

fn build_api_request(request: &Request) -> ApiRequest {
    let generation_config = if request.temperature.is_some() || request.response_schema.is_some() {
        Some(ApiGenerationConfig {
            temperature: request.temperature,
            response_mime_type: request
                .response_schema
                .as_ref()
                .map(|_| "application/json".to_string()),
            response_schema: request.response_schema.clone(),
            response_modalities: None,
            speech_config: None,
        })
    } else {
        None
    };

    ApiRequest {
        system_instruction: request.system_instruction.as_ref().map(|text| ApiContent {
            role: None,
            parts: vec![ApiPart {
                text: Some(text.clone()),
                inline_data: None,
            }],
        }),
        contents: request.contents.iter().map(content_to_api).collect(),
        generation_config,
    }
}

fn build_speech_request(request: &SpeechRequest) -> ApiRequest {
    ApiRequest {
        system_instruction: None,
        contents: vec![ApiContent {
            role: None,
            parts: vec![ApiPart {
                text: Some(request.text.clone()),
                inline_data: None,
            }],
        }],
        generation_config: Some(ApiGenerationConfig {
            temperature: None,
            response_mime_type: None,
            response_schema: None,
            response_modalities: Some(vec!["AUDIO".to_string()]),
            speech_config: Some(ApiSpeechConfig {
                voice_config: ApiVoiceConfig {
                    prebuilt_voice_config: ApiPrebuiltVoiceConfig {
                        voice_name: request.voice.clone(),
                    },
                },
            }),
        }),
    }
}

fn content_to_api(content: &Content) -> ApiContent {
    ApiContent {
        role: Some(match content.role {
            Role::User => "user".to_string(),
            Role::Model => "model".to_string(),
        }),
        parts: content
            .parts
            .iter()
            .map(|part| match part {
                Part::Text { text } => ApiPart {
                    text: Some(text.clone()),
                    inline_data: None,
                },
                Part::InlineData { mime_type, data } => ApiPart {
                    text: None,
                    inline_data: Some(ApiInlineData {
                        mime_type: mime_type.clone(),
                        data: data.clone(),
                    }),
                },
            })
            .collect(),
    }
}

fn parse_response(api_response: ApiResponse) -> Result<Response, Error> {
    let candidate = api_response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| Error::Parse("response contained no candidates".to_string()))?;

    let parts = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| {
                    if let Some(text) = part.text {
                        Some(Part::Text { text })
                    } else {
                        part.inline_data.map(|inline| Part::InlineData {
                            mime_type: inline.mime_type,
                            data: inline.data,
                        })
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let finish_reason = match candidate.finish_reason.as_deref() {
        Some("STOP") | None => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::MaxTokens,
        Some("SAFETY") => FinishReason::Safety,
        Some(_) => FinishReason::Other,
    };

    let usage = api_response
        .usage_metadata
        .map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            response_tokens: u.candidates_token_count,
        })
        .unwrap_or_default();

    Ok(Response {
        parts,
        finish_reason,
        usage,
    })
}

fn extract_speech(response: Response) -> Result<SpeechResponse, Error> {
    match response.inline_data() {
        Some((mime_type, data)) => Ok(SpeechResponse {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        }),
        None => Err(Error::Parse(
            "response contained no audio data".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Gemini::new("test-key");
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.speech_model, DEFAULT_SPEECH_MODEL);
    }

    #[test]
    fn test_client_with_model() {
        let client = Gemini::new("test-key").with_model("gemini-2.0-pro");
        assert_eq!(client.model, "gemini-2.0-pro");
    }

    #[test]
    fn test_request_builder() {
        let request = Request::new(vec![Content::user("Hello")])
            .with_system("You are a storyteller")
            .with_temperature(0.9)
            .with_response_schema(serde_json::json!({"type": "OBJECT"}));

        assert!(request.system_instruction.is_some());
        assert_eq!(request.temperature, Some(0.9));
        assert!(request.response_schema.is_some());
    }

    #[test]
    fn test_content_creation() {
        let user = Content::user("Hello");
        assert!(matches!(user.role, Role::User));
        assert_eq!(user.parts.len(), 1);

        let model = Content::model("Once upon a time");
        assert!(matches!(model.role, Role::Model));
    }

    #[test]
    fn test_schema_forces_json_mime_type() {
        let request = Request::new(vec![Content::user("Hello")])
            .with_response_schema(serde_json::json!({"type": "OBJECT"}));
        let api_request = build_api_request(&request);

        let config = api_request.generation_config.expect("config");
        assert_eq!(config.response_mime_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn test_parse_text_response() {
        let raw = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "hello "}, {"text": "world"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 2}
        }"#;
        let api: ApiResponse = serde_json::from_str(raw).unwrap();
        let response = parse_response(api).unwrap();

        assert_eq!(response.text(), "hello world");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage.prompt_tokens, 7);
    }

    #[test]
    fn test_parse_audio_response() {
        let raw = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"inlineData": {"mimeType": "audio/L16;codec=pcm;rate=24000", "data": "AAAA"}}
                ]},
                "finishReason": "STOP"
            }]
        }"#;
        let api: ApiResponse = serde_json::from_str(raw).unwrap();
        let response = parse_response(api).unwrap();

        let speech = extract_speech(response).unwrap();
        assert_eq!(speech.data, "AAAA");
        assert!(speech.mime_type.starts_with("audio/L16"));
    }

    #[test]
    fn test_missing_audio_is_parse_error() {
        let raw = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "no audio here"}]},
                "finishReason": "STOP"
            }]
        }"#;
        let api: ApiResponse = serde_json::from_str(raw).unwrap();
        let response = parse_response(api).unwrap();

        assert!(matches!(extract_speech(response), Err(Error::Parse(_))));
    }

    #[test]
    fn test_empty_candidates_is_parse_error() {
        let api: ApiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(parse_response(api), Err(Error::Parse(_))));
    }
}
