//! Render orchestration for the storyteller TUI

use katha_core::PlaybackPhase;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode, QUICK_ACTIONS};
use crate::ui::widgets::{InputWidget, StoryboardWidget};

/// Overlay types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    Help,
    ConfirmReset,
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title bar
            Constraint::Min(0),    // main
            Constraint::Length(1), // status bar
            Constraint::Length(3), // input
        ])
        .split(area);

    render_title_bar(frame, app, rows[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(34), Constraint::Min(0)])
        .split(rows[1]);

    render_sidebar(frame, app, columns[0]);

    let storyboard = StoryboardWidget::new(app.session.segments(), &app.theme)
        .scroll(app.scroll, app.scroll_locked_to_bottom)
        .generating(app.generating, app.spinner_frame);
    frame.render_widget(storyboard, columns[1]);

    render_status_bar(frame, app, rows[2]);
    render_input(frame, app, rows[3]);

    if let Some(overlay) = app.overlay() {
        render_overlay(frame, app, *overlay, area);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let playback = match app.session.playback_phase() {
        PlaybackPhase::Playing => Span::styled(
            "  > playing  ",
            ratatui::style::Style::default().fg(app.theme.playing),
        ),
        PlaybackPhase::Loading => Span::styled(
            "  ~ preparing audio  ",
            ratatui::style::Style::default().fg(app.theme.loading),
        ),
        PlaybackPhase::Idle => Span::raw("  "),
    };

    let mut spans = vec![
        Span::styled("कथा सागर", app.theme.title_style()),
        Span::raw("  Katha Sagar"),
    ];
    if let Some(title) = app.session.title() {
        spans.push(Span::raw("  -  "));
        spans.push(Span::styled(title.to_string(), app.theme.title_style()));
    }
    spans.push(playback);

    let bar = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(app.theme.border_style(false)),
    );
    frame.render_widget(bar, area);
}

fn render_sidebar(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled("Story Controls", app.theme.title_style())),
        Line::default(),
    ];

    for (i, (label, _)) in QUICK_ACTIONS.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("{}  ", i + 1), app.theme.speaker_style(label)),
            Span::raw(*label),
        ]));
    }

    lines.push(Line::default());
    lines.push(Line::from(vec![
        Span::styled("lang ", app.theme.system_style()),
        Span::raw(app.language.clone()),
    ]));
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "i prompt   p play/stop",
        app.theme.system_style(),
    )));
    lines.push(Line::from(Span::styled(
        "d save wav x save doc",
        app.theme.system_style(),
    )));
    lines.push(Line::from(Span::styled(
        "n new      ? help",
        app.theme.system_style(),
    )));

    let sidebar = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(app.theme.border_style(false))
            .title(" कहानी नियंत्रण "),
    );
    frame.render_widget(sidebar, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mode = match app.input_mode {
        InputMode::Normal => "NORMAL",
        InputMode::Insert => "INSERT",
        InputMode::Command => "COMMAND",
    };

    let mut spans = vec![
        Span::styled(format!(" {mode} "), app.theme.title_style()),
        Span::raw(" "),
    ];
    if app.generating {
        spans.push(Span::styled("writing... ", app.theme.system_style()));
    }
    if let Some(message) = app.status_message() {
        spans.push(Span::styled(message.to_string(), app.theme.system_style()));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let is_command = app.input_mode == InputMode::Command;
    let placeholder = if app.initial {
        "Your story's subject, in any language..."
    } else {
        "What happens next?"
    };

    let (content, cursor) = if is_command {
        (app.command_buffer(), app.command_buffer().chars().count())
    } else {
        (app.input_buffer(), app.cursor_position())
    };

    let input = InputWidget::new(content, &app.theme)
        .cursor_position(cursor)
        .placeholder(placeholder)
        .active(app.input_mode != InputMode::Normal)
        .command_mode(is_command);
    frame.render_widget(input, area);
}

fn render_overlay(frame: &mut Frame, app: &App, overlay: Overlay, area: Rect) {
    let (title, lines) = match overlay {
        Overlay::Help => (
            " Help ",
            vec![
                Line::from("i / a     enter prompt, Enter submits"),
                Line::from(":lang xx  switch story language"),
                Line::from("1-5       quick story directions"),
                Line::from("p         play or stop the audio drama"),
                Line::from("d         save story audio as .wav"),
                Line::from("x         save story document"),
                Line::from("n / :new  start a new story"),
                Line::from("j / k     scroll, g / G top / bottom"),
                Line::from("q         quit"),
                Line::default(),
                Line::from("press any key to close"),
            ],
        ),
        Overlay::ConfirmReset => (
            " New Story ",
            vec![
                Line::from("Start a new story?"),
                Line::from("The current story and its audio will be discarded."),
                Line::default(),
                Line::from("y - yes    n - no"),
            ],
        ),
    };

    let width = 56.min(area.width.saturating_sub(4));
    let height = (lines.len() as u16 + 2).min(area.height.saturating_sub(2));
    let popup = centered_rect(area, width, height);

    frame.render_widget(Clear, popup);
    let body = Paragraph::new(lines).alignment(Alignment::Left).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(app.theme.border_style(true))
            .title(title),
    );
    frame.render_widget(body, popup);
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
