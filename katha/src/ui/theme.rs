//! Color theme and styling for the storyteller TUI

use katha_core::export::speaker_palette_index;
use ratatui::style::{Color, Modifier, Style};

/// Storyboard UI color theme
#[derive(Debug, Clone)]
pub struct StoryTheme {
    pub border: Color,
    pub border_focused: Color,
    pub title: Color,

    pub narration_text: Color,
    pub transition_text: Color,
    pub narrator_label: Color,
    pub system_text: Color,

    pub playing: Color,
    pub loading: Color,

    /// Stable per-speaker palette, indexed by the speaker name hash.
    pub speaker_colors: [Color; 7],
}

impl Default for StoryTheme {
    fn default() -> Self {
        Self {
            border: Color::DarkGray,
            border_focused: Color::Yellow,
            title: Color::LightYellow,

            narration_text: Color::Gray,
            transition_text: Color::DarkGray,
            narrator_label: Color::DarkGray,
            system_text: Color::DarkGray,

            playing: Color::LightGreen,
            loading: Color::Yellow,

            speaker_colors: [
                Color::LightRed,
                Color::LightBlue,
                Color::LightGreen,
                Color::LightYellow,
                Color::LightCyan,
                Color::LightMagenta,
                Color::Cyan,
            ],
        }
    }
}

impl StoryTheme {
    /// Style for narration lines.
    pub fn narration_style(&self) -> Style {
        Style::default()
            .fg(self.narration_text)
            .add_modifier(Modifier::ITALIC)
    }

    /// Style for transition lines.
    pub fn transition_style(&self) -> Style {
        Style::default()
            .fg(self.transition_text)
            .add_modifier(Modifier::ITALIC)
    }

    /// Style for a dialogue speaker label, stable per name.
    pub fn speaker_style(&self, name: &str) -> Style {
        let color = match speaker_palette_index(name) {
            Some(index) => self.speaker_colors[index % self.speaker_colors.len()],
            None => self.narrator_label,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    /// Style for dialogue text.
    pub fn dialogue_style(&self) -> Style {
        Style::default().fg(Color::White)
    }

    /// Style for system/status messages.
    pub fn system_style(&self) -> Style {
        Style::default().fg(self.system_text)
    }

    /// Border style for a panel.
    pub fn border_style(&self, focused: bool) -> Style {
        Style::default().fg(if focused {
            self.border_focused
        } else {
            self.border
        })
    }

    /// Style for the title bar.
    pub fn title_style(&self) -> Style {
        Style::default()
            .fg(self.title)
            .add_modifier(Modifier::BOLD)
    }
}
