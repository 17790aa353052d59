//! The audio artifact pipeline: pure PCM transforms, the single-slot
//! artifact cache, and the playback controller.

pub mod cache;
pub mod pcm;
pub mod playback;

pub use cache::{AudioArtifact, AudioCache};
pub use pcm::DecodeError;
pub use playback::{
    AudioOutput, OutputHandle, PlaybackController, PlaybackError, PlaybackEvent, PlaybackPhase,
    RodioOutput,
};
