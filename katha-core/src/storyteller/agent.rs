//! The storyteller agent: decides between "start" and "continue" semantics
//! against the upstream generative service and owns the per-language
//! continuation context.
//!
//! The continuation handle is an explicit tagged state
//! ([`ContextState::None`] or [`ContextState::Bound`]) inspected before every
//! call: continuation never straddles languages, and resetting discards the
//! context without touching narrative history already appended elsewhere.

use gemini::{Content, Gemini, Request, SpeechRequest};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::schema;
use crate::story::StoryUpdate;

/// Errors surfaced by storyteller operations.
#[derive(Debug, Error)]
pub enum StorytellerError {
    /// Upstream access is not configured. Fatal; never retried.
    #[error("no API key configured - set GEMINI_API_KEY environment variable")]
    MissingCredential,

    /// Network or model failure. The same request is safe to retry manually.
    #[error("story service error: {0}")]
    Upstream(String),

    /// The response did not conform to the segment schema. Narrative state
    /// is left unchanged.
    #[error("malformed story response: {0}")]
    MalformedResponse(String),
}

impl From<gemini::Error> for StorytellerError {
    fn from(e: gemini::Error) -> Self {
        match e {
            gemini::Error::NoApiKey | gemini::Error::Config(_) => Self::MissingCredential,
            gemini::Error::Network(msg) => Self::Upstream(msg),
            gemini::Error::Api { status, message } => {
                Self::Upstream(format!("status {status}: {message}"))
            }
            gemini::Error::Parse(msg) => Self::MalformedResponse(msg),
        }
    }
}

/// Configuration for the storyteller.
#[derive(Debug, Clone)]
pub struct StorytellerConfig {
    /// Generation model override.
    pub model: Option<String>,

    /// Speech synthesis model override.
    pub speech_model: Option<String>,

    /// Prebuilt voice for synthesis.
    pub voice: String,

    /// Temperature for generation.
    pub temperature: Option<f32>,

    /// Extra instructions appended to the director prompt.
    pub custom_system_prompt: Option<String>,
}

impl Default for StorytellerConfig {
    fn default() -> Self {
        Self {
            model: None,
            speech_model: None,
            voice: "Kore".to_string(),
            temperature: None,
            custom_system_prompt: None,
        }
    }
}

/// Opaque continuation handle, bound to one language.
#[derive(Debug, Clone)]
pub struct SessionContext {
    id: Uuid,
    language: String,
    history: Vec<Content>,
}

impl SessionContext {
    fn new(language: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            language: language.into(),
            history: Vec::new(),
        }
    }

    /// Stable identity of this context; survives continuation, changes on
    /// re-binding.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Number of committed conversation turns.
    pub fn turn_count(&self) -> usize {
        self.history.len()
    }
}

/// The continuation state: no context, or one bound context.
#[derive(Debug, Clone, Default)]
pub enum ContextState {
    #[default]
    None,
    Bound(SessionContext),
}

/// The AI audio-drama director.
pub struct Storyteller {
    client: Gemini,
    config: StorytellerConfig,
    context: ContextState,
}

impl Storyteller {
    /// Create a new storyteller with an API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Gemini::new(api_key),
            config: StorytellerConfig::default(),
            context: ContextState::None,
        }
    }

    /// Create a storyteller from the GEMINI_API_KEY environment variable.
    ///
    /// Fails with [`StorytellerError::MissingCredential`] before any network
    /// call is attempted.
    pub fn from_env() -> Result<Self, StorytellerError> {
        let client = Gemini::from_env()?;
        Ok(Self {
            client,
            config: StorytellerConfig::default(),
            context: ContextState::None,
        })
    }

    /// Configure the storyteller.
    pub fn with_config(mut self, config: StorytellerConfig) -> Self {
        self.config = config;
        self
    }

    /// The live continuation context, if any.
    pub fn context(&self) -> Option<&SessionContext> {
        match &self.context {
            ContextState::Bound(ctx) => Some(ctx),
            ContextState::None => None,
        }
    }

    /// Discard the continuation context.
    pub fn reset(&mut self) {
        self.context = ContextState::None;
    }

    /// Start a brand-new story in the given language.
    ///
    /// Always binds a fresh context, seeds it with the prompt, and returns
    /// the generated opening.
    pub async fn start_story(
        &mut self,
        prompt: &str,
        language: &str,
    ) -> Result<StoryUpdate, StorytellerError> {
        self.rebind(language);
        let message = format!(
            "Start a new story. Write it ENTIRELY in the language of this prompt: \
             \"{prompt}\". Use the 2-3 dialogue pacing rule."
        );
        self.send_story_message(language, message).await
    }

    /// Continue the story with a new instruction.
    ///
    /// If no context exists, or the bound language differs, the call
    /// re-binds to a fresh context; otherwise the instruction rides on the
    /// existing history so the service retains prior narrative memory.
    pub async fn continue_story(
        &mut self,
        instruction: &str,
        language: &str,
    ) -> Result<StoryUpdate, StorytellerError> {
        let rebound = self.ensure_binding(language);
        if rebound {
            debug!(language, "continuation re-bound to a fresh context");
        }
        let message = format!(
            "Continue the story in the SAME language used before. Instruction: {instruction}"
        );
        self.send_story_message(language, message).await
    }

    /// Synthesize speech for a flattened story script.
    ///
    /// Returns the base64-encoded raw PCM payload.
    pub async fn synthesize_speech(&self, script: &str) -> Result<String, StorytellerError> {
        let mut request = SpeechRequest::new(script, &self.config.voice);
        if let Some(ref model) = self.config.speech_model {
            request = request.with_model(model);
        }
        let speech = self.client.synthesize(request).await?;
        debug!(mime_type = %speech.mime_type, "speech synthesized");
        Ok(speech.data)
    }

    /// Replace any context with a fresh one bound to `language`.
    fn rebind(&mut self, language: &str) {
        self.context = ContextState::Bound(SessionContext::new(language));
    }

    /// Bind a fresh context unless one already exists for `language`.
    /// Returns whether a re-bind happened.
    fn ensure_binding(&mut self, language: &str) -> bool {
        match &self.context {
            ContextState::Bound(ctx) if ctx.language == language => false,
            _ => {
                self.rebind(language);
                true
            }
        }
    }

    async fn send_story_message(
        &mut self,
        language: &str,
        message: String,
    ) -> Result<StoryUpdate, StorytellerError> {
        let mut contents = match &self.context {
            ContextState::Bound(ctx) => ctx.history.clone(),
            ContextState::None => Vec::new(),
        };
        contents.push(Content::user(&message));

        let mut request = Request::new(contents)
            .with_system(self.system_prompt())
            .with_response_schema(schema::story_response_schema());
        if let Some(ref model) = self.config.model {
            request = request.with_model(model);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self.client.generate(request).await?;
        let text = response.text();
        let update = schema::parse_story(&text)?;

        // Commit the exchange to the context only after validation, so a
        // malformed response leaves continuation state untouched.
        if let ContextState::Bound(ctx) = &mut self.context {
            if ctx.language == language {
                ctx.history.push(Content::user(message));
                ctx.history.push(Content::model(text));
            }
        }

        info!(
            segments = update.segments.len(),
            language, "story update received"
        );
        Ok(update)
    }

    fn system_prompt(&self) -> String {
        let mut prompt = include_str!("prompts/director_base.txt").to_string();
        if let Some(ref custom) = self.config.custom_system_prompt {
            prompt.push_str("\n\nADDITIONAL INSTRUCTIONS:\n");
            prompt.push_str(custom);
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_always_rebinds() {
        let mut storyteller = Storyteller::new("test-key");
        storyteller.rebind("en");
        let first = storyteller.context().unwrap().id();

        storyteller.rebind("en");
        let second = storyteller.context().unwrap().id();

        assert_ne!(first, second);
    }

    #[test]
    fn test_continue_reuses_same_language_context() {
        let mut storyteller = Storyteller::new("test-key");

        assert!(storyteller.ensure_binding("en"));
        let bound = storyteller.context().unwrap().id();

        // Same language: the existing context survives.
        assert!(!storyteller.ensure_binding("en"));
        assert_eq!(storyteller.context().unwrap().id(), bound);
        assert_eq!(storyteller.context().unwrap().language(), "en");
    }

    #[test]
    fn test_language_switch_rebinds() {
        let mut storyteller = Storyteller::new("test-key");

        storyteller.ensure_binding("en");
        let english = storyteller.context().unwrap().id();

        assert!(storyteller.ensure_binding("hi"));
        let hindi = storyteller.context().unwrap().id();

        assert_ne!(english, hindi);
        assert_eq!(storyteller.context().unwrap().language(), "hi");
    }

    #[test]
    fn test_reset_discards_context() {
        let mut storyteller = Storyteller::new("test-key");
        storyteller.ensure_binding("en");
        assert!(storyteller.context().is_some());

        storyteller.reset();
        assert!(storyteller.context().is_none());
    }

    #[test]
    fn test_system_prompt_includes_custom_instructions() {
        let storyteller = Storyteller::new("test-key").with_config(StorytellerConfig {
            custom_system_prompt: Some("Keep stories short.".to_string()),
            ..StorytellerConfig::default()
        });

        let prompt = storyteller.system_prompt();
        assert!(prompt.contains("Katha Sagar"));
        assert!(prompt.contains("Keep stories short."));
    }

    #[test]
    fn test_error_mapping() {
        let missing: StorytellerError = gemini::Error::NoApiKey.into();
        assert!(matches!(missing, StorytellerError::MissingCredential));

        let upstream: StorytellerError = gemini::Error::Network("timeout".to_string()).into();
        assert!(matches!(upstream, StorytellerError::Upstream(_)));

        let malformed: StorytellerError = gemini::Error::Parse("bad".to_string()).into();
        assert!(matches!(malformed, StorytellerError::MalformedResponse(_)));
    }
}
