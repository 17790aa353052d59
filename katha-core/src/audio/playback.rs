//! Playback controller: a small state machine owning at most one active
//! output stream.
//!
//! The audio device sits behind the [`AudioOutput`] trait so the controller
//! can be driven in tests without a sound card; the binary uses
//! [`RodioOutput`]. Phase changes are published on a watch channel so any
//! observer can follow the `Idle -> Loading -> Playing -> Idle` lifecycle;
//! explicit stop and natural end-of-stream converge on the same `Idle` state.

use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

/// Failure to open or drive the audio output device.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio output unavailable: {0}")]
    Output(String),
}

/// An audio output device that can start playing decoded frames.
pub trait AudioOutput {
    type Handle: OutputHandle;

    /// Begin playback of per-channel frames at the given sample rate.
    fn start(
        &mut self,
        frames: Vec<Vec<f32>>,
        sample_rate: u32,
    ) -> Result<Self::Handle, PlaybackError>;
}

/// An active output stream.
pub trait OutputHandle {
    /// Stop playback and release the output resource before returning.
    fn stop(&mut self);

    /// Whether the stream has reached its natural end.
    fn is_finished(&self) -> bool;
}

/// Observable playback phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Idle,
    /// Synthesis or decoding in flight.
    Loading,
    Playing,
}

/// Completion notification from [`PlaybackController::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Finished,
}

/// Owns zero or one active playback handle.
pub struct PlaybackController<O: AudioOutput> {
    output: O,
    handle: Option<O::Handle>,
    phase: PlaybackPhase,
    phase_tx: watch::Sender<PlaybackPhase>,
}

impl<O: AudioOutput> PlaybackController<O> {
    pub fn new(output: O) -> Self {
        let (phase_tx, _) = watch::channel(PlaybackPhase::Idle);
        Self {
            output,
            handle: None,
            phase: PlaybackPhase::Idle,
            phase_tx,
        }
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    /// Subscribe to phase changes.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackPhase> {
        self.phase_tx.subscribe()
    }

    /// Enter `Loading` ahead of a synthesis call.
    ///
    /// Returns `false` if a load is already in flight (the request is a
    /// no-op, preventing duplicate synthesis). Any active playback is
    /// stopped first.
    pub fn begin_loading(&mut self) -> bool {
        if self.phase == PlaybackPhase::Loading {
            return false;
        }
        self.release_handle();
        self.set_phase(PlaybackPhase::Loading);
        true
    }

    /// Abandon an in-flight load after a synthesis or decode failure.
    pub fn abort_loading(&mut self) {
        if self.phase == PlaybackPhase::Loading {
            self.set_phase(PlaybackPhase::Idle);
        }
    }

    /// Start playing decoded frames, from `Idle` (cache hit) or `Loading`.
    ///
    /// Any previously active handle is stopped synchronously before the new
    /// stream starts; there are never two live outputs.
    pub fn start(
        &mut self,
        frames: Vec<Vec<f32>>,
        sample_rate: u32,
    ) -> Result<(), PlaybackError> {
        self.release_handle();
        match self.output.start(frames, sample_rate) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.set_phase(PlaybackPhase::Playing);
                Ok(())
            }
            Err(e) => {
                self.set_phase(PlaybackPhase::Idle);
                Err(e)
            }
        }
    }

    /// Stop playback. A no-op while `Idle`; from `Loading` the pending load
    /// result is discarded.
    pub fn stop(&mut self) {
        self.release_handle();
        self.set_phase(PlaybackPhase::Idle);
    }

    /// Detect natural end-of-stream. Transitions `Playing -> Idle` and
    /// reports the completion, converging with explicit stop.
    pub fn poll(&mut self) -> Option<PlaybackEvent> {
        if self.phase != PlaybackPhase::Playing {
            return None;
        }
        let finished = self
            .handle
            .as_ref()
            .map(OutputHandle::is_finished)
            .unwrap_or(true);
        if !finished {
            return None;
        }
        self.release_handle();
        self.set_phase(PlaybackPhase::Idle);
        Some(PlaybackEvent::Finished)
    }

    fn release_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stop();
        }
    }

    fn set_phase(&mut self, phase: PlaybackPhase) {
        if self.phase != phase {
            debug!(?phase, "playback phase change");
            self.phase = phase;
            let _ = self.phase_tx.send(phase);
        }
    }
}

// ============================================================================
// Rodio-backed output
// ============================================================================

/// Output to the default audio device via rodio.
///
/// The device is opened lazily on the first playback and kept open for the
/// rest of the process.
#[derive(Default)]
pub struct RodioOutput {
    stream: Option<(rodio::OutputStream, rodio::OutputStreamHandle)>,
}

impl RodioOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

/// An active rodio sink.
pub struct RodioHandle {
    sink: rodio::Sink,
}

impl AudioOutput for RodioOutput {
    type Handle = RodioHandle;

    fn start(
        &mut self,
        frames: Vec<Vec<f32>>,
        sample_rate: u32,
    ) -> Result<Self::Handle, PlaybackError> {
        if self.stream.is_none() {
            let opened = rodio::OutputStream::try_default()
                .map_err(|e| PlaybackError::Output(e.to_string()))?;
            self.stream = Some(opened);
        }
        let Some((_stream, stream_handle)) = self.stream.as_ref() else {
            return Err(PlaybackError::Output("output stream unavailable".to_string()));
        };

        let sink =
            rodio::Sink::try_new(stream_handle).map_err(|e| PlaybackError::Output(e.to_string()))?;
        let channels = frames.len().max(1) as u16;
        let source =
            rodio::buffer::SamplesBuffer::new(channels, sample_rate, interleave(&frames));
        sink.append(source);
        Ok(RodioHandle { sink })
    }
}

impl OutputHandle for RodioHandle {
    fn stop(&mut self) {
        self.sink.stop();
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }
}

/// Re-interleave per-channel frames for the output device.
fn interleave(frames: &[Vec<f32>]) -> Vec<f32> {
    let frame_count = frames.iter().map(Vec::len).min().unwrap_or(0);
    let mut out = Vec::with_capacity(frame_count * frames.len());
    for i in 0..frame_count {
        for channel in frames {
            out.push(channel[i]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestOutput;

    fn mono_frames() -> Vec<Vec<f32>> {
        vec![vec![0.0, 0.25, -0.25]]
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let (output, controls) = TestOutput::new();
        let mut controller = PlaybackController::new(output);

        controller.stop();
        assert_eq!(controller.phase(), PlaybackPhase::Idle);
        assert!(controls.events().is_empty());
    }

    #[test]
    fn test_request_while_loading_is_noop() {
        let (output, _controls) = TestOutput::new();
        let mut controller = PlaybackController::new(output);

        assert!(controller.begin_loading());
        assert!(!controller.begin_loading());
        assert_eq!(controller.phase(), PlaybackPhase::Loading);
    }

    #[test]
    fn test_loading_success_reaches_playing() {
        let (output, _controls) = TestOutput::new();
        let mut controller = PlaybackController::new(output);

        assert!(controller.begin_loading());
        controller.start(mono_frames(), 24_000).unwrap();
        assert_eq!(controller.phase(), PlaybackPhase::Playing);
    }

    #[test]
    fn test_loading_failure_returns_to_idle() {
        let (output, controls) = TestOutput::new();
        let mut controller = PlaybackController::new(output);

        assert!(controller.begin_loading());
        controller.abort_loading();
        assert_eq!(controller.phase(), PlaybackPhase::Idle);

        // Output failure during start also lands on Idle.
        assert!(controller.begin_loading());
        controls.fail_next_start();
        assert!(controller.start(mono_frames(), 24_000).is_err());
        assert_eq!(controller.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_restart_stops_previous_handle_first() {
        let (output, controls) = TestOutput::new();
        let mut controller = PlaybackController::new(output);

        controller.start(mono_frames(), 24_000).unwrap();
        controller.start(mono_frames(), 24_000).unwrap();

        // TestOutput panics if two handles are ever live at once; the event
        // log shows the stop landing between the two starts.
        let events = controls.events();
        assert_eq!(events.len(), 3);
        assert!(events[0].is_start());
        assert!(events[1].is_stop());
        assert!(events[2].is_start());
        assert_eq!(controller.phase(), PlaybackPhase::Playing);
    }

    #[test]
    fn test_natural_end_converges_on_idle() {
        let (output, controls) = TestOutput::new();
        let mut controller = PlaybackController::new(output);
        let mut phases = controller.subscribe();

        controller.start(mono_frames(), 24_000).unwrap();
        assert!(controller.poll().is_none());

        controls.finish_current();
        assert_eq!(controller.poll(), Some(PlaybackEvent::Finished));
        assert_eq!(controller.phase(), PlaybackPhase::Idle);
        assert!(controller.poll().is_none());

        // The subscriber observed the final phase.
        assert!(phases.has_changed().unwrap());
        assert_eq!(*phases.borrow_and_update(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_explicit_stop_converges_on_idle() {
        let (output, controls) = TestOutput::new();
        let mut controller = PlaybackController::new(output);

        controller.start(mono_frames(), 24_000).unwrap();
        controller.stop();

        assert_eq!(controller.phase(), PlaybackPhase::Idle);
        assert!(controls.events().last().unwrap().is_stop());
    }

    #[test]
    fn test_interleave() {
        let frames = vec![vec![1.0, 3.0], vec![2.0, 4.0]];
        assert_eq!(interleave(&frames), vec![1.0, 2.0, 3.0, 4.0]);
        assert!(interleave(&[]).is_empty());
    }
}
