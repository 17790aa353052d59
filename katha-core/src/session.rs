//! StorySession - the primary public API for audio-drama sessions.
//!
//! This module wraps the storyteller, the narrative store, the audio cache
//! and the playback controller into a single, easy-to-use API. It is the
//! only surface the TUI touches.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::audio::{
    pcm, AudioArtifact, AudioCache, AudioOutput, DecodeError, PlaybackController, PlaybackError,
    PlaybackEvent, PlaybackPhase, RodioOutput,
};
use crate::export;
use crate::story::{Fingerprint, Segment, StoryState};
use crate::storyteller::{SessionContext, Storyteller, StorytellerConfig, StorytellerError};

/// Errors from StorySession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Story(#[from] StorytellerError),

    #[error("audio decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for creating a new story session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Generation model override.
    pub model: Option<String>,

    /// Speech synthesis model override.
    pub speech_model: Option<String>,

    /// Prebuilt synthesis voice (defaults to the storyteller's voice).
    pub voice: Option<String>,

    /// Temperature for generation.
    pub temperature: Option<f32>,

    /// Extra instructions appended to the director prompt.
    pub custom_system_prompt: Option<String>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_speech_model(mut self, model: impl Into<String>) -> Self {
        self.speech_model = Some(model.into());
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_system_prompt = Some(prompt.into());
        self
    }
}

impl From<SessionConfig> for StorytellerConfig {
    fn from(config: SessionConfig) -> Self {
        let defaults = StorytellerConfig::default();
        StorytellerConfig {
            model: config.model,
            speech_model: config.speech_model,
            voice: config.voice.unwrap_or(defaults.voice),
            temperature: config.temperature,
            custom_system_prompt: config.custom_system_prompt,
        }
    }
}

/// An interactive audio-drama session.
///
/// Manages the storyteller (generation + synthesis), the narrative store,
/// the single-slot audio cache and playback. Audio is re-synthesized only
/// when the story has changed since the cached artifact was produced.
pub struct StorySession<O: AudioOutput = RodioOutput> {
    storyteller: Storyteller,
    story: StoryState,
    cache: AudioCache,
    playback: PlaybackController<O>,
}

impl StorySession<RodioOutput> {
    /// Create a session playing to the default audio device.
    ///
    /// Requires the `GEMINI_API_KEY` environment variable; fails fast with
    /// [`StorytellerError::MissingCredential`] before any network call.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let storyteller = Storyteller::from_env()?.with_config(config.into());
        Ok(Self::with_output(storyteller, RodioOutput::new()))
    }
}

impl<O: AudioOutput> StorySession<O> {
    /// Create a session with a custom audio output.
    pub fn with_output(storyteller: Storyteller, output: O) -> Self {
        Self {
            storyteller,
            story: StoryState::new(),
            cache: AudioCache::new(),
            playback: PlaybackController::new(output),
        }
    }

    /// Start a brand-new story in the given language.
    ///
    /// Returns the number of appended segments.
    pub async fn start_story(
        &mut self,
        prompt: &str,
        language: &str,
    ) -> Result<usize, SessionError> {
        let update = self.storyteller.start_story(prompt, language).await?;
        Ok(self.append_update(update))
    }

    /// Continue the story with a new instruction.
    ///
    /// Returns the number of appended segments.
    pub async fn continue_story(
        &mut self,
        instruction: &str,
        language: &str,
    ) -> Result<usize, SessionError> {
        let update = self.storyteller.continue_story(instruction, language).await?;
        Ok(self.append_update(update))
    }

    fn append_update(&mut self, update: crate::story::StoryUpdate) -> usize {
        let appended = self.story.apply_update(update);
        // Invalidation is synchronous with the store mutation.
        self.cache.invalidate();
        appended
    }

    /// Request playback of the full story.
    ///
    /// A no-op on an empty story (synthesis is never invoked) and while a
    /// load is already in flight. Active playback is stopped and restarted
    /// from the beginning. On a cache miss the story is synthesized first;
    /// a failure leaves playback idle and the cache empty so a retry
    /// re-attempts synthesis.
    pub async fn request_playback(&mut self) -> Result<(), SessionError> {
        if self.story.is_empty() {
            return Ok(());
        }
        match self.playback.phase() {
            PlaybackPhase::Loading => return Ok(()),
            PlaybackPhase::Playing => self.playback.stop(),
            PlaybackPhase::Idle => {}
        }

        let fingerprint = self.story.fingerprint();
        if let Some(artifact) = self.cache.get(fingerprint) {
            debug!("audio cache hit");
            let frames = pcm::bytes_to_channel_frames(&artifact.pcm, artifact.channels);
            let sample_rate = artifact.sample_rate;
            self.playback.start(frames, sample_rate)?;
            return Ok(());
        }

        self.playback.begin_loading();
        match self.synthesize_artifact(fingerprint).await {
            Ok(artifact) => {
                let frames = pcm::bytes_to_channel_frames(&artifact.pcm, artifact.channels);
                let sample_rate = artifact.sample_rate;
                self.cache.put(artifact);
                self.playback.start(frames, sample_rate)?;
                Ok(())
            }
            Err(e) => {
                self.playback.abort_loading();
                Err(e)
            }
        }
    }

    /// Stop playback. A no-op while idle.
    pub fn stop_playback(&mut self) {
        self.playback.stop();
    }

    /// Detect natural end-of-stream; call periodically.
    pub fn poll_playback(&mut self) -> Option<PlaybackEvent> {
        self.playback.poll()
    }

    pub fn playback_phase(&self) -> PlaybackPhase {
        self.playback.phase()
    }

    /// Subscribe to playback phase changes.
    pub fn subscribe_playback(&self) -> watch::Receiver<PlaybackPhase> {
        self.playback.subscribe()
    }

    /// Full RIFF/WAVE container bytes for the story audio, synthesizing if
    /// the cache has no artifact for the current story.
    pub async fn wav_bytes(&mut self) -> Result<Vec<u8>, SessionError> {
        let artifact = self.ensure_artifact().await?;
        Ok(pcm::wav_bytes(
            &artifact.pcm,
            artifact.sample_rate,
            artifact.channels,
        ))
    }

    /// Filename for the downloadable container, derived from the title.
    pub fn wav_filename(&self) -> String {
        format!("{}.wav", self.export_stem())
    }

    /// Write the story audio as a `.wav` file into `dir`.
    pub async fn export_wav(&mut self, dir: impl AsRef<Path>) -> Result<PathBuf, SessionError> {
        let bytes = self.wav_bytes().await?;
        let path = dir.as_ref().join(self.wav_filename());
        fs::write(&path, bytes).await?;
        info!(path = %path.display(), "story audio exported");
        Ok(path)
    }

    /// Write the story as an HTML document (opened by word processors)
    /// into `dir`.
    pub async fn export_document(&self, dir: impl AsRef<Path>) -> Result<PathBuf, SessionError> {
        let html = export::render_document(&self.story);
        let path = dir.as_ref().join(format!("{}.doc", self.export_stem()));
        fs::write(&path, format!("\u{feff}{html}")).await?;
        info!(path = %path.display(), "story document exported");
        Ok(path)
    }

    /// Replace the text of a segment. Invalidates any cached audio.
    pub fn update_segment(&mut self, id: &str, text: impl Into<String>) -> bool {
        let changed = self.story.update_segment(id, text);
        if changed {
            self.cache.invalidate();
        }
        changed
    }

    /// Delete a segment. Invalidates any cached audio.
    pub fn delete_segment(&mut self, id: &str) -> bool {
        let changed = self.story.delete_segment(id);
        if changed {
            self.cache.invalidate();
        }
        changed
    }

    /// Discard the story, the continuation context and any cached audio.
    ///
    /// `confirm` is the caller-supplied confirmation; when it returns
    /// `false` nothing happens.
    pub fn reset<F: FnOnce() -> bool>(&mut self, confirm: F) -> bool {
        if !confirm() {
            return false;
        }
        self.playback.stop();
        self.storyteller.reset();
        self.story.clear();
        self.cache.invalidate();
        info!("session reset");
        true
    }

    pub fn story(&self) -> &StoryState {
        &self.story
    }

    pub fn segments(&self) -> &[Segment] {
        self.story.segments()
    }

    pub fn title(&self) -> Option<&str> {
        self.story.title()
    }

    /// The live continuation context, if any.
    pub fn context(&self) -> Option<&SessionContext> {
        self.storyteller.context()
    }

    async fn ensure_artifact(&mut self) -> Result<&AudioArtifact, SessionError> {
        let fingerprint = self.story.fingerprint();
        if self.cache.get(fingerprint).is_none() {
            let artifact = self.synthesize_artifact(fingerprint).await?;
            return Ok(self.cache.put(artifact));
        }
        Ok(self
            .cache
            .get(fingerprint)
            .expect("artifact checked present above"))
    }

    async fn synthesize_artifact(
        &mut self,
        fingerprint: Fingerprint,
    ) -> Result<AudioArtifact, SessionError> {
        let script = self.story.render_script();
        info!(script_chars = script.len(), "requesting speech synthesis");
        let base64 = self.storyteller.synthesize_speech(&script).await?;
        let pcm_bytes = pcm::decode_base64(&base64)?;
        Ok(AudioArtifact {
            pcm: pcm_bytes,
            sample_rate: pcm::SAMPLE_RATE,
            channels: pcm::CHANNELS,
            fingerprint,
        })
    }

    fn export_stem(&self) -> String {
        let stem = self
            .story
            .title()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("story");
        stem.chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '-' } else { c })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::{SegmentKind, StoryUpdate};
    use crate::testing::TestOutput;

    fn session() -> (StorySession<TestOutput>, crate::testing::TestOutputControls) {
        let (output, controls) = TestOutput::new();
        let session = StorySession::with_output(Storyteller::new("test-key"), output);
        (session, controls)
    }

    fn one_segment_update() -> StoryUpdate {
        StoryUpdate {
            title: Some("The Old Fort".to_string()),
            segments: vec![Segment {
                id: "s1".to_string(),
                kind: SegmentKind::Narration,
                text: "Night falls.".to_string(),
                speaker: None,
                emotion: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_empty_story_playback_is_noop() {
        let (mut session, controls) = session();

        // No synthesis, no playback, no error - and no network call either,
        // which is what lets this test run offline.
        session.request_playback().await.unwrap();
        assert_eq!(session.playback_phase(), PlaybackPhase::Idle);
        assert!(controls.events().is_empty());
    }

    #[tokio::test]
    async fn test_cache_hit_plays_directly() {
        let (mut session, controls) = session();
        session.append_update(one_segment_update());

        let fingerprint = session.story.fingerprint();
        session.cache.put(AudioArtifact {
            pcm: vec![0, 0, 1, 0, 2, 0],
            sample_rate: pcm::SAMPLE_RATE,
            channels: pcm::CHANNELS,
            fingerprint,
        });

        session.request_playback().await.unwrap();
        assert_eq!(session.playback_phase(), PlaybackPhase::Playing);
        assert_eq!(controls.events().len(), 1);
    }

    #[tokio::test]
    async fn test_request_while_loading_is_noop() {
        let (mut session, controls) = session();
        session.append_update(one_segment_update());
        session.playback.begin_loading();

        session.request_playback().await.unwrap();
        assert_eq!(session.playback_phase(), PlaybackPhase::Loading);
        assert!(controls.events().is_empty());
    }

    #[tokio::test]
    async fn test_append_invalidates_cache() {
        let (mut session, _controls) = session();
        session.append_update(one_segment_update());

        let fingerprint = session.story.fingerprint();
        session.cache.put(AudioArtifact {
            pcm: vec![0, 0],
            sample_rate: pcm::SAMPLE_RATE,
            channels: pcm::CHANNELS,
            fingerprint,
        });
        assert!(session.cache.get(fingerprint).is_some());

        session.append_update(StoryUpdate {
            title: None,
            segments: vec![Segment {
                id: "s2".to_string(),
                kind: SegmentKind::Narration,
                text: "More.".to_string(),
                speaker: None,
                emotion: None,
            }],
        });
        assert!(session.cache.is_empty());
    }

    #[tokio::test]
    async fn test_edit_and_delete_invalidate_cache() {
        let (mut session, _controls) = session();
        session.append_update(one_segment_update());
        let fingerprint = session.story.fingerprint();

        session.cache.put(AudioArtifact {
            pcm: vec![0, 0],
            sample_rate: pcm::SAMPLE_RATE,
            channels: pcm::CHANNELS,
            fingerprint,
        });
        assert!(session.update_segment("s1", "Dawn breaks."));
        assert!(session.cache.is_empty());

        session.cache.put(AudioArtifact {
            pcm: vec![0, 0],
            sample_rate: pcm::SAMPLE_RATE,
            channels: pcm::CHANNELS,
            fingerprint: session.story.fingerprint(),
        });
        assert!(session.delete_segment("s1"));
        assert!(session.cache.is_empty());

        // Unknown ids change nothing and keep the cache as-is.
        session.cache.put(AudioArtifact {
            pcm: vec![0, 0],
            sample_rate: pcm::SAMPLE_RATE,
            channels: pcm::CHANNELS,
            fingerprint: session.story.fingerprint(),
        });
        assert!(!session.delete_segment("missing"));
        assert!(!session.cache.is_empty());
    }

    #[tokio::test]
    async fn test_reset_requires_confirmation() {
        let (mut session, _controls) = session();
        session.append_update(one_segment_update());

        assert!(!session.reset(|| false));
        assert_eq!(session.segments().len(), 1);
        assert_eq!(session.title(), Some("The Old Fort"));

        assert!(session.reset(|| true));
        assert!(session.segments().is_empty());
        assert_eq!(session.title(), None);
        assert!(session.cache.is_empty());
    }

    #[test]
    fn test_wav_filename_from_title() {
        let (mut session, _controls) = session();
        assert_eq!(session.wav_filename(), "story.wav");

        session.append_update(StoryUpdate {
            title: Some("Raat / Ki Baat".to_string()),
            segments: vec![],
        });
        assert_eq!(session.wav_filename(), "Raat - Ki Baat.wav");
    }
}
