//! Storyboard widget: renders the segment sequence

use katha_core::{Segment, SegmentKind};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::ui::theme::StoryTheme;

const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];

/// Widget displaying the story segments
pub struct StoryboardWidget<'a> {
    segments: &'a [Segment],
    theme: &'a StoryTheme,
    scroll: usize,
    stick_to_bottom: bool,
    generating: bool,
    spinner_frame: u8,
}

impl<'a> StoryboardWidget<'a> {
    pub fn new(segments: &'a [Segment], theme: &'a StoryTheme) -> Self {
        Self {
            segments,
            theme,
            scroll: 0,
            stick_to_bottom: true,
            generating: false,
            spinner_frame: 0,
        }
    }

    pub fn scroll(mut self, scroll: usize, stick_to_bottom: bool) -> Self {
        self.scroll = scroll;
        self.stick_to_bottom = stick_to_bottom;
        self
    }

    pub fn generating(mut self, generating: bool, spinner_frame: u8) -> Self {
        self.generating = generating;
        self.spinner_frame = spinner_frame;
        self
    }

    fn build_lines(&self) -> Vec<Line<'a>> {
        let mut lines = Vec::new();
        for segment in self.segments {
            if segment.is_narration() || segment.kind == SegmentKind::Transition {
                let style = if segment.kind == SegmentKind::Transition {
                    self.theme.transition_style()
                } else {
                    self.theme.narration_style()
                };
                lines.push(Line::from(Span::styled(segment.text.as_str(), style)));
            } else {
                let speaker = segment.speaker_or_narrator();
                let mut header = vec![Span::styled(
                    speaker.to_uppercase(),
                    self.theme.speaker_style(speaker),
                )];
                if let Some(emotion) = segment.emotion.as_deref() {
                    header.push(Span::raw(" "));
                    header.push(Span::styled(
                        format!("({emotion})"),
                        self.theme.system_style(),
                    ));
                }
                lines.push(Line::from(header));
                lines.push(Line::from(Span::styled(
                    segment.text.as_str(),
                    self.theme.dialogue_style(),
                )));
            }
            lines.push(Line::default());
        }

        if self.generating {
            let spinner = SPINNER_FRAMES[self.spinner_frame as usize % SPINNER_FRAMES.len()];
            lines.push(Line::from(Span::styled(
                format!("{spinner} The storyteller is writing..."),
                self.theme.system_style(),
            )));
        }

        lines
    }
}

impl Widget for StoryboardWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(false))
            .title(" Storyboard ");
        let inner = block.inner(area);
        block.render(area, buf);

        if self.segments.is_empty() && !self.generating {
            let empty = Paragraph::new(vec![
                Line::default(),
                Line::from(Span::styled(
                    "No story yet.",
                    self.theme.narration_style(),
                )),
                Line::from(Span::styled(
                    "Press 'i' and describe your story's subject to begin.",
                    self.theme.system_style(),
                )),
            ])
            .alignment(Alignment::Center);
            empty.render(inner, buf);
            return;
        }

        let lines = self.build_lines();
        let scroll = if self.stick_to_bottom {
            lines.len().saturating_sub(inner.height as usize)
        } else {
            self.scroll.min(lines.len().saturating_sub(1))
        };

        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((scroll as u16, 0))
            .render(inner, buf);
    }
}
