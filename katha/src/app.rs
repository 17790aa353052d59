//! Main application state and logic

use katha_core::{PlaybackPhase, SessionError, StorySession, StorytellerError};

use crate::ui::theme::StoryTheme;
use crate::ui::Overlay;

/// Vim-style input modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Normal mode - navigation and hotkeys (default)
    #[default]
    Normal,
    /// Insert mode - prompt text input
    Insert,
    /// Command mode - entering : commands
    Command,
}

/// Quick story directions offered in the sidebar, keyed 1-5.
pub const QUICK_ACTIONS: [(&str, &str); 5] = [
    ("Add a twist", "कहानी में एक नया मोड़ लाओ (Add a twist)"),
    ("More emotion", "ज्यादा भावनाओं के साथ लिखो (Add more emotion)"),
    ("More dialogue", "पात्रों के बीच बातचीत बढ़ाओ (More dialogue)"),
    ("Make it exciting", "कहानी को रोमांचक बनाओ (Make it exciting)"),
    ("End the story", "कहानी का समापन करो (End the story)"),
];

/// Main application state
pub struct App {
    pub session: StorySession,

    // UI state
    pub theme: StoryTheme,
    pub input_mode: InputMode,
    overlay: Option<Overlay>,

    // Storyboard scrolling
    pub scroll: usize,
    pub scroll_locked_to_bottom: bool,

    // Input state
    input_buffer: String,
    cursor_position: usize,
    command_buffer: String,

    // Status
    status_message: Option<String>,
    pub should_quit: bool,

    // The next prompt starts a new story (first run, or after a reset)
    pub initial: bool,

    // Active language tag for session binding (set with :lang)
    pub language: String,

    // In-flight guard: a generation request is outstanding
    pub generating: bool,

    // Work queued by event handling, drained by the main loop
    pub pending_prompt: Option<String>,
    pub pending_play: bool,
    pub pending_download: bool,
    pub pending_export: bool,

    // Animation
    pub spinner_frame: u8,
}

impl App {
    pub fn new(session: StorySession) -> Self {
        Self {
            session,
            theme: StoryTheme::default(),
            input_mode: InputMode::Normal,
            overlay: None,
            scroll: 0,
            scroll_locked_to_bottom: true,
            input_buffer: String::new(),
            cursor_position: 0,
            command_buffer: String::new(),
            status_message: None,
            should_quit: false,
            initial: true,
            language: "hi".to_string(),
            generating: false,
            pending_prompt: None,
            pending_play: false,
            pending_download: false,
            pending_export: false,
            spinner_frame: 0,
        }
    }

    // ------------------------------------------------------------------
    // Overlay
    // ------------------------------------------------------------------

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn has_overlay(&self) -> bool {
        self.overlay.is_some()
    }

    pub fn open_overlay(&mut self, overlay: Overlay) {
        self.overlay = Some(overlay);
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    // ------------------------------------------------------------------
    // Input editing
    // ------------------------------------------------------------------

    pub fn input_buffer(&self) -> &str {
        &self.input_buffer
    }

    pub fn cursor_position(&self) -> usize {
        self.cursor_position
    }

    pub fn command_buffer(&self) -> &str {
        &self.command_buffer
    }

    pub fn insert_char(&mut self, c: char) {
        self.input_buffer.insert(self.byte_cursor(), c);
        self.cursor_position += 1;
    }

    pub fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let at = self.byte_cursor();
            self.input_buffer.remove(at);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let max = self.input_buffer.chars().count();
        if self.cursor_position < max {
            self.cursor_position += 1;
        }
    }

    pub fn cursor_home(&mut self) {
        self.cursor_position = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor_position = self.input_buffer.chars().count();
    }

    /// Take the input buffer for submission; empty input submits nothing.
    pub fn submit_input(&mut self) -> Option<String> {
        let text = self.input_buffer.trim().to_string();
        self.input_buffer.clear();
        self.cursor_position = 0;
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn byte_cursor(&self) -> usize {
        self.input_buffer
            .char_indices()
            .nth(self.cursor_position)
            .map(|(i, _)| i)
            .unwrap_or(self.input_buffer.len())
    }

    // ------------------------------------------------------------------
    // Command mode
    // ------------------------------------------------------------------

    pub fn enter_command_mode(&mut self) {
        self.input_mode = InputMode::Command;
        self.command_buffer.clear();
    }

    pub fn command_push(&mut self, c: char) {
        self.command_buffer.push(c);
    }

    pub fn command_pop(&mut self) {
        self.command_buffer.pop();
    }

    /// Execute the buffered : command.
    pub fn execute_command(&mut self) {
        let command = std::mem::take(&mut self.command_buffer);
        self.input_mode = InputMode::Normal;

        let mut parts = command.split_whitespace();
        match parts.next() {
            Some("q") | Some("quit") => self.should_quit = true,
            Some("new") => self.open_overlay(Overlay::ConfirmReset),
            Some("help") => self.open_overlay(Overlay::Help),
            Some("wav") => self.pending_download = true,
            Some("doc") => self.pending_export = true,
            Some("lang") => match parts.next() {
                Some(tag) => {
                    self.language = tag.to_string();
                    self.set_status(format!("Language set to '{tag}'"));
                }
                None => self.set_status(format!("Language: '{}'", self.language)),
            },
            Some(other) => self.set_status(format!("Unknown command: {other}")),
            None => {}
        }
    }

    // ------------------------------------------------------------------
    // Status and ticking
    // ------------------------------------------------------------------

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    /// Advance animations and poll playback completion.
    pub fn tick(&mut self) {
        self.spinner_frame = self.spinner_frame.wrapping_add(1);
        if self.session.poll_playback().is_some() {
            self.set_status("Playback finished");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.session.playback_phase() == PlaybackPhase::Playing
    }

    pub fn is_audio_loading(&self) -> bool {
        self.session.playback_phase() == PlaybackPhase::Loading
    }

    // ------------------------------------------------------------------
    // Session actions
    // ------------------------------------------------------------------

    /// Reset the story after the user confirmed in the overlay.
    pub fn confirmed_reset(&mut self) {
        if self.session.reset(|| true) {
            self.initial = true;
            self.scroll = 0;
            self.scroll_locked_to_bottom = true;
            self.set_status("New story - enter a subject to begin");
        }
    }

    /// Queue a quick action instruction (only meaningful mid-story).
    pub fn queue_quick_action(&mut self, index: usize) {
        if self.initial {
            self.set_status("Start a story first");
            return;
        }
        if let Some((_, instruction)) = QUICK_ACTIONS.get(index) {
            self.pending_prompt = Some((*instruction).to_string());
        }
    }

    /// Human-readable description of a session error for the status bar.
    pub fn describe_error(error: &SessionError) -> String {
        match error {
            SessionError::Story(StorytellerError::MissingCredential) => {
                "GEMINI_API_KEY is not set - configure it and restart".to_string()
            }
            SessionError::Story(StorytellerError::Upstream(_)) => {
                "Story service error - please try again".to_string()
            }
            SessionError::Story(StorytellerError::MalformedResponse(_)) => {
                "The storyteller gave an unreadable answer - try again".to_string()
            }
            SessionError::Decode(_) => "Audio could not be decoded".to_string(),
            SessionError::Playback(e) => format!("Playback failed: {e}"),
            SessionError::Io(e) => format!("File error: {e}"),
        }
    }

    // ------------------------------------------------------------------
    // Scrolling
    // ------------------------------------------------------------------

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.scroll_locked_to_bottom = false;
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = 0;
        self.scroll_locked_to_bottom = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_locked_to_bottom = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use katha_core::{RodioOutput, Storyteller, StorySession};

    fn app() -> App {
        let session = StorySession::with_output(Storyteller::new("test-key"), RodioOutput::new());
        App::new(session)
    }

    #[test]
    fn test_input_editing() {
        let mut app = app();
        for c in "कहानी".chars() {
            app.insert_char(c);
        }
        assert_eq!(app.input_buffer(), "कहानी");

        app.delete_char();
        assert_eq!(app.input_buffer(), "कहान");

        app.cursor_home();
        app.insert_char('x');
        assert_eq!(app.input_buffer(), "xकहान");
    }

    #[test]
    fn test_submit_input_trims_and_clears() {
        let mut app = app();
        for c in "  hello  ".chars() {
            app.insert_char(c);
        }
        assert_eq!(app.submit_input().as_deref(), Some("hello"));
        assert_eq!(app.input_buffer(), "");
        assert_eq!(app.submit_input(), None);
    }

    #[test]
    fn test_lang_command() {
        let mut app = app();
        app.enter_command_mode();
        for c in "lang en".chars() {
            app.command_push(c);
        }
        app.execute_command();

        assert_eq!(app.language, "en");
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_quit_command() {
        let mut app = app();
        app.enter_command_mode();
        app.command_push('q');
        app.execute_command();
        assert!(app.should_quit);
    }

    #[test]
    fn test_quick_action_requires_started_story() {
        let mut app = app();
        app.queue_quick_action(0);
        assert!(app.pending_prompt.is_none());

        app.initial = false;
        app.queue_quick_action(0);
        assert!(app
            .pending_prompt
            .as_deref()
            .unwrap()
            .contains("Add a twist"));
    }
}
