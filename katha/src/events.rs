//! Event handling for the storyteller TUI

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, InputMode};
use crate::ui::Overlay;

/// Result of handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Continue,
    Quit,
    NeedsRedraw,
}

/// Handle a terminal event
pub fn handle_event(app: &mut App, event: Event) -> EventResult {
    match event {
        Event::Key(key) => handle_key_event(app, key),
        Event::Mouse(mouse) => handle_mouse_event(app, mouse),
        Event::Resize(_, _) => EventResult::NeedsRedraw,
        _ => EventResult::Continue,
    }
}

fn handle_mouse_event(app: &mut App, mouse: MouseEvent) -> EventResult {
    match mouse.kind {
        MouseEventKind::ScrollUp => {
            app.scroll_up(3);
            EventResult::NeedsRedraw
        }
        MouseEventKind::ScrollDown => {
            app.scroll_down(3);
            EventResult::NeedsRedraw
        }
        _ => EventResult::Continue,
    }
}

fn handle_key_event(app: &mut App, key: KeyEvent) -> EventResult {
    // Overlay keys first
    if app.has_overlay() {
        return handle_overlay_key(app, key);
    }

    // Global shortcuts
    if let (KeyCode::Char('c'), KeyModifiers::CONTROL) = (key.code, key.modifiers) {
        return EventResult::Quit;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Insert => handle_insert_mode(app, key),
        InputMode::Command => handle_command_mode(app, key),
    }
}

/// Handle keys in NORMAL mode (vim-style navigation and hotkeys)
fn handle_normal_mode(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        // Mode switching
        KeyCode::Char('i') => {
            app.input_mode = InputMode::Insert;
            EventResult::NeedsRedraw
        }
        KeyCode::Char('a') => {
            app.input_mode = InputMode::Insert;
            app.cursor_end();
            EventResult::NeedsRedraw
        }
        KeyCode::Char(':') => {
            app.enter_command_mode();
            EventResult::NeedsRedraw
        }

        // Help
        KeyCode::Char('?') | KeyCode::F(1) => {
            app.open_overlay(Overlay::Help);
            EventResult::NeedsRedraw
        }

        // Quit
        KeyCode::Char('q') => EventResult::Quit,

        // Navigation
        KeyCode::Char('j') | KeyCode::Down => {
            app.scroll_down(1);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.scroll_up(1);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('g') => {
            app.scroll_to_top();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('G') => {
            app.scroll_to_bottom();
            EventResult::NeedsRedraw
        }

        // Audio
        KeyCode::Char('p') => {
            if app.is_playing() {
                app.session.stop_playback();
                app.set_status("Stopped");
            } else {
                app.pending_play = true;
            }
            EventResult::NeedsRedraw
        }
        KeyCode::Char('s') => {
            app.session.stop_playback();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('d') => {
            app.pending_download = true;
            EventResult::NeedsRedraw
        }
        KeyCode::Char('x') => {
            app.pending_export = true;
            EventResult::NeedsRedraw
        }

        // New story (with confirmation)
        KeyCode::Char('n') => {
            app.open_overlay(Overlay::ConfirmReset);
            EventResult::NeedsRedraw
        }

        // Quick story actions
        KeyCode::Char(c @ '1'..='5') => {
            let index = (c as usize) - ('1' as usize);
            app.queue_quick_action(index);
            EventResult::NeedsRedraw
        }

        _ => EventResult::Continue,
    }
}

/// Handle keys in INSERT mode (prompt entry)
fn handle_insert_mode(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            EventResult::NeedsRedraw
        }
        KeyCode::Enter => {
            if app.generating {
                app.set_status("Still writing - please wait");
                return EventResult::NeedsRedraw;
            }
            if let Some(prompt) = app.submit_input() {
                app.pending_prompt = Some(prompt);
                app.input_mode = InputMode::Normal;
            }
            EventResult::NeedsRedraw
        }
        KeyCode::Char(c) => {
            app.insert_char(c);
            EventResult::NeedsRedraw
        }
        KeyCode::Backspace => {
            app.delete_char();
            EventResult::NeedsRedraw
        }
        KeyCode::Left => {
            app.cursor_left();
            EventResult::NeedsRedraw
        }
        KeyCode::Right => {
            app.cursor_right();
            EventResult::NeedsRedraw
        }
        KeyCode::Home => {
            app.cursor_home();
            EventResult::NeedsRedraw
        }
        KeyCode::End => {
            app.cursor_end();
            EventResult::NeedsRedraw
        }
        _ => EventResult::Continue,
    }
}

/// Handle keys in COMMAND mode
fn handle_command_mode(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            EventResult::NeedsRedraw
        }
        KeyCode::Enter => {
            app.execute_command();
            EventResult::NeedsRedraw
        }
        KeyCode::Char(c) => {
            app.command_push(c);
            EventResult::NeedsRedraw
        }
        KeyCode::Backspace => {
            app.command_pop();
            EventResult::NeedsRedraw
        }
        _ => EventResult::Continue,
    }
}

/// Handle keys while an overlay is open
fn handle_overlay_key(app: &mut App, key: KeyEvent) -> EventResult {
    let confirm_reset = matches!(app.overlay(), Some(Overlay::ConfirmReset));
    if confirm_reset {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                app.close_overlay();
                app.confirmed_reset();
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.close_overlay();
            }
            _ => {}
        }
        return EventResult::NeedsRedraw;
    }

    // Help overlay: any key closes it
    app.close_overlay();
    EventResult::NeedsRedraw
}

#[cfg(test)]
mod tests {
    use super::*;
    use katha_core::{RodioOutput, Storyteller, StorySession};

    fn app() -> App {
        let session = StorySession::with_output(Storyteller::new("test-key"), RodioOutput::new());
        App::new(session)
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_insert_mode_round_trip() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Char('i')));
        assert_eq!(app.input_mode, InputMode::Insert);

        handle_event(&mut app, key(KeyCode::Char('h')));
        handle_event(&mut app, key(KeyCode::Char('i')));
        handle_event(&mut app, key(KeyCode::Enter));

        assert_eq!(app.pending_prompt.as_deref(), Some("hi"));
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_reset_needs_confirmation() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Char('n')));
        assert!(app.has_overlay());

        handle_event(&mut app, key(KeyCode::Esc));
        assert!(!app.has_overlay());
    }

    #[test]
    fn test_quit_key() {
        let mut app = app();
        assert_eq!(handle_event(&mut app, key(KeyCode::Char('q'))), EventResult::Quit);
    }

    #[test]
    fn test_play_key_queues_request() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Char('p')));
        assert!(app.pending_play);
    }
}
