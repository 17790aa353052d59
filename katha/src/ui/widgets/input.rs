//! Prompt input widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::ui::theme::StoryTheme;

/// Input field widget
pub struct InputWidget<'a> {
    content: &'a str,
    cursor_position: usize,
    theme: &'a StoryTheme,
    placeholder: &'a str,
    is_active: bool,
    is_command_mode: bool,
}

impl<'a> InputWidget<'a> {
    pub fn new(content: &'a str, theme: &'a StoryTheme) -> Self {
        Self {
            content,
            cursor_position: content.chars().count(),
            theme,
            placeholder: "",
            is_active: false,
            is_command_mode: false,
        }
    }

    pub fn cursor_position(mut self, pos: usize) -> Self {
        self.cursor_position = pos;
        self
    }

    pub fn placeholder(mut self, placeholder: &'a str) -> Self {
        self.placeholder = placeholder;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    pub fn command_mode(mut self, is_command: bool) -> Self {
        self.is_command_mode = is_command;
        self
    }
}

impl Widget for InputWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = if self.is_command_mode {
            " Command "
        } else {
            " Prompt "
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(self.is_active))
            .title(title);
        let inner = block.inner(area);
        block.render(area, buf);

        if self.content.is_empty() && !self.is_active {
            Paragraph::new(Span::styled(self.placeholder, self.theme.system_style()))
                .render(inner, buf);
            return;
        }

        let prefix = if self.is_command_mode { ":" } else { "" };
        let mut spans = vec![Span::raw(prefix)];

        if self.is_active {
            // Split around the cursor so it renders as a reversed cell.
            let chars: Vec<char> = self.content.chars().collect();
            let before: String = chars[..self.cursor_position.min(chars.len())].iter().collect();
            let at: String = chars
                .get(self.cursor_position)
                .map(|c| c.to_string())
                .unwrap_or_else(|| " ".to_string());
            let after: String = if self.cursor_position + 1 <= chars.len() {
                chars[(self.cursor_position + 1).min(chars.len())..]
                    .iter()
                    .collect()
            } else {
                String::new()
            };

            spans.push(Span::raw(before));
            spans.push(Span::styled(at, Style::default().add_modifier(Modifier::REVERSED)));
            spans.push(Span::raw(after));
        } else {
            spans.push(Span::raw(self.content));
        }

        Paragraph::new(Line::from(spans)).render(inner, buf);
    }
}
