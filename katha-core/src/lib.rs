//! Interactive audio-drama engine with an AI storyteller.
//!
//! This crate provides:
//! - Multi-turn story generation with per-language session contexts
//! - A binary audio pipeline turning synthesized PCM into playback and
//!   downloadable WAV containers
//! - Single-slot caching of the synthesized artifact keyed by a story
//!   fingerprint
//! - Story document export
//!
//! # Quick Start
//!
//! ```ignore
//! use katha_core::{SessionConfig, StorySession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = StorySession::new(SessionConfig::new())?;
//!
//!     session.start_story("a hidden treasure in an old fort", "en").await?;
//!     session.continue_story("add a twist", "en").await?;
//!
//!     session.request_playback().await?;
//!     session.export_wav(".").await?;
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod export;
pub mod session;
pub mod story;
pub mod storyteller;
pub mod testing;

// Primary public API
pub use audio::{
    AudioArtifact, AudioCache, AudioOutput, PlaybackController, PlaybackEvent, PlaybackPhase,
    RodioOutput,
};
pub use session::{SessionConfig, SessionError, StorySession};
pub use story::{Segment, SegmentKind, StoryState, StoryUpdate, NARRATOR};
pub use storyteller::{Storyteller, StorytellerConfig, StorytellerError};
