//! The storyteller: session management and generation against the upstream
//! Gemini service.

pub mod agent;
pub mod schema;

pub use agent::{
    ContextState, SessionContext, Storyteller, StorytellerConfig, StorytellerError,
};
