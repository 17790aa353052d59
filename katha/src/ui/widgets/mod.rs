//! Widgets for the storyteller TUI

pub mod input;
pub mod storyboard;

pub use input::InputWidget;
pub use storyboard::StoryboardWidget;
