//! Testing utilities for the audio-drama engine.
//!
//! This module provides tools for integration testing:
//! - `TestOutput` for driving the playback controller without a sound card
//! - `TestHarness` for scripted narrative/audio scenarios without API calls
//! - Assertion helpers for verifying pipeline state

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio::{
    pcm, AudioArtifact, AudioCache, AudioOutput, OutputHandle, PlaybackController, PlaybackError,
    PlaybackPhase,
};
use crate::session::SessionError;
use crate::story::{Segment, SegmentKind, StoryState, StoryUpdate};
use crate::storyteller::StorytellerError;

// ============================================================================
// Test audio output
// ============================================================================

/// Events recorded by [`TestOutput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutputEvent {
    Started {
        channels: usize,
        frames: usize,
        sample_rate: u32,
    },
    Stopped,
}

impl TestOutputEvent {
    pub fn is_start(&self) -> bool {
        matches!(self, TestOutputEvent::Started { .. })
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, TestOutputEvent::Stopped)
    }
}

/// Shared handles into a [`TestOutput`], usable after the output has moved
/// into a controller.
#[derive(Clone, Default)]
pub struct TestOutputControls {
    events: Arc<Mutex<Vec<TestOutputEvent>>>,
    finished: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
    fail_next: Arc<AtomicBool>,
}

impl TestOutputControls {
    /// Snapshot of the recorded start/stop events.
    pub fn events(&self) -> Vec<TestOutputEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of `Started` events recorded so far.
    pub fn starts(&self) -> usize {
        self.events().iter().filter(|e| e.is_start()).count()
    }

    /// Simulate the current stream reaching its natural end.
    pub fn finish_current(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    /// Make the next `start` call fail.
    pub fn fail_next_start(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of handles currently live.
    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// An [`AudioOutput`] that records events instead of playing audio.
///
/// Panics if a second handle is started while one is still live, pinning
/// the exclusive-playback invariant in every test that uses it.
pub struct TestOutput {
    controls: TestOutputControls,
}

impl TestOutput {
    pub fn new() -> (Self, TestOutputControls) {
        let controls = TestOutputControls::default();
        (
            Self {
                controls: controls.clone(),
            },
            controls,
        )
    }
}

/// A live handle produced by [`TestOutput`].
pub struct TestHandle {
    controls: TestOutputControls,
    released: bool,
}

impl AudioOutput for TestOutput {
    type Handle = TestHandle;

    fn start(
        &mut self,
        frames: Vec<Vec<f32>>,
        sample_rate: u32,
    ) -> Result<Self::Handle, PlaybackError> {
        if self.controls.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PlaybackError::Output("scripted output failure".to_string()));
        }
        assert_eq!(
            self.controls.live.load(Ordering::SeqCst),
            0,
            "two playback handles live at once"
        );
        self.controls.live.fetch_add(1, Ordering::SeqCst);
        self.controls.finished.store(false, Ordering::SeqCst);
        self.controls
            .events
            .lock()
            .unwrap()
            .push(TestOutputEvent::Started {
                channels: frames.len(),
                frames: frames.first().map_or(0, Vec::len),
                sample_rate,
            });
        Ok(TestHandle {
            controls: self.controls.clone(),
            released: false,
        })
    }
}

impl OutputHandle for TestHandle {
    fn stop(&mut self) {
        if !self.released {
            self.released = true;
            self.controls.live.fetch_sub(1, Ordering::SeqCst);
            self.controls
                .events
                .lock()
                .unwrap()
                .push(TestOutputEvent::Stopped);
        }
    }

    fn is_finished(&self) -> bool {
        self.controls.finished.load(Ordering::SeqCst)
    }
}

impl Drop for TestHandle {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            self.controls.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

// ============================================================================
// Segment and update builders
// ============================================================================

/// Build a narration segment.
pub fn narration(id: &str, text: &str) -> Segment {
    Segment {
        id: id.to_string(),
        kind: SegmentKind::Narration,
        text: text.to_string(),
        speaker: None,
        emotion: Some("calm".to_string()),
    }
}

/// Build a dialogue segment.
pub fn dialogue(id: &str, speaker: &str, text: &str) -> Segment {
    Segment {
        id: id.to_string(),
        kind: SegmentKind::Dialogue,
        text: text.to_string(),
        speaker: Some(speaker.to_string()),
        emotion: Some("neutral".to_string()),
    }
}

/// Build a story update from a title and segments.
pub fn update(title: Option<&str>, segments: Vec<Segment>) -> StoryUpdate {
    StoryUpdate {
        title: title.map(String::from),
        segments,
    }
}

/// Little-endian PCM16 bytes for the given samples.
pub fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

// ============================================================================
// Test harness
// ============================================================================

/// Harness for scripted narrative/audio scenarios.
///
/// Mirrors the session's orchestration over the real store, cache and
/// playback controller, with generation and synthesis replaced by scripted
/// results, for deterministic tests without API calls.
pub struct TestHarness {
    pub story: StoryState,
    pub cache: AudioCache,
    pub playback: PlaybackController<TestOutput>,
    pub output: TestOutputControls,
    synth_results: Vec<Result<Vec<u8>, StorytellerError>>,
    /// Number of synthesis attempts (scripted or default).
    pub synth_calls: usize,
}

impl TestHarness {
    pub fn new() -> Self {
        let (output, controls) = TestOutput::new();
        Self {
            story: StoryState::new(),
            cache: AudioCache::new(),
            playback: PlaybackController::new(output),
            output: controls,
            synth_results: Vec::new(),
            synth_calls: 0,
        }
    }

    /// Append a scripted generation result, invalidating the cache
    /// synchronously like the session does. Returns the appended count.
    pub fn apply(&mut self, update: StoryUpdate) -> usize {
        let appended = self.story.apply_update(update);
        self.cache.invalidate();
        appended
    }

    /// Edit a segment's text, with synchronous invalidation.
    pub fn edit(&mut self, id: &str, text: &str) -> bool {
        let changed = self.story.update_segment(id, text);
        if changed {
            self.cache.invalidate();
        }
        changed
    }

    /// Delete a segment, with synchronous invalidation.
    pub fn delete(&mut self, id: &str) -> bool {
        let changed = self.story.delete_segment(id);
        if changed {
            self.cache.invalidate();
        }
        changed
    }

    /// Queue a synthesis result.
    pub fn expect_synthesis(&mut self, pcm: Vec<u8>) -> &mut Self {
        self.synth_results.push(Ok(pcm));
        self
    }

    /// Queue a synthesis failure.
    pub fn expect_synthesis_failure(&mut self) -> &mut Self {
        self.synth_results
            .push(Err(StorytellerError::Upstream("scripted failure".to_string())));
        self
    }

    /// Request playback of the full story, following the same control flow
    /// as the session: empty-story no-op, loading guard, cache lookup,
    /// scripted synthesis on a miss.
    pub fn request_playback(&mut self) -> Result<(), SessionError> {
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
            let frames = pcm::bytes_to_channel_frames(&artifact.pcm, artifact.channels);
            let sample_rate = artifact.sample_rate;
            self.playback.start(frames, sample_rate)?;
            return Ok(());
        }

        self.playback.begin_loading();
        match self.next_synthesis() {
            Ok(bytes) => {
                let artifact = AudioArtifact {
                    pcm: bytes,
                    sample_rate: pcm::SAMPLE_RATE,
                    channels: pcm::CHANNELS,
                    fingerprint,
                };
                let frames = pcm::bytes_to_channel_frames(&artifact.pcm, artifact.channels);
                let sample_rate = artifact.sample_rate;
                self.cache.put(artifact);
                self.playback.start(frames, sample_rate)?;
                Ok(())
            }
            Err(e) => {
                self.playback.abort_loading();
                Err(e.into())
            }
        }
    }

    fn next_synthesis(&mut self) -> Result<Vec<u8>, StorytellerError> {
        self.synth_calls += 1;
        if self.synth_results.is_empty() {
            return Ok(pcm_bytes(&[0, 100, -100, 200]));
        }
        self.synth_results.remove(0)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the cache has no artifact for the current story.
#[track_caller]
pub fn assert_cache_miss(harness: &TestHarness) {
    assert!(
        harness.cache.get(harness.story.fingerprint()).is_none(),
        "Expected a cache miss for the current story"
    );
}

/// Assert the cache holds an artifact for the current story.
#[track_caller]
pub fn assert_cache_hit(harness: &TestHarness) {
    assert!(
        harness.cache.get(harness.story.fingerprint()).is_some(),
        "Expected a cache hit for the current story"
    );
}

/// Assert the playback controller is in the given phase.
#[track_caller]
pub fn assert_phase(harness: &TestHarness, phase: PlaybackPhase) {
    assert_eq!(
        harness.playback.phase(),
        phase,
        "Unexpected playback phase"
    );
}
