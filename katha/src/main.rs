//! Katha Sagar - AI audio-drama storyteller TUI.
//!
//! A vim-style terminal interface for writing interactive audio-dramas with
//! an AI storyteller: prompt the story forward, listen to the synthesized
//! drama, and save it as a WAV file or document.

mod app;
mod events;
mod ui;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use katha_core::{SessionConfig, StorySession};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, stdout};
use std::time::Duration;

use app::App;
use events::{handle_event, EventResult};
use ui::render::render;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    // Check for API key before doing anything else
    if std::env::var("GEMINI_API_KEY").is_err() {
        eprintln!("Error: GEMINI_API_KEY environment variable not set.");
        eprintln!("Please set it in .env file or with: export GEMINI_API_KEY=your_key_here");
        std::process::exit(1);
    }

    init_logging();

    let session = match StorySession::new(SessionConfig::new()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to create story session: {e}");
            std::process::exit(1);
        }
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, App::new(session)).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;

    if let Err(e) = result {
        eprintln!("Error: {e}");
    }

    Ok(())
}

/// The TUI owns the terminal, so logs go to a file.
fn init_logging() {
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("katha.log")
    else {
        return;
    };
    tracing_subscriber::fmt()
        .with_writer(file)
        .with_ansi(false)
        .with_target(false)
        .init();
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| render(f, &app))?;

        // Drain a queued prompt (generation is serialized: the in-flight
        // flag stops a second request from starting)
        if let Some(prompt) = app.pending_prompt.take() {
            if !app.generating {
                app.generating = true;
                app.clear_status();
                terminal.draw(|f| render(f, &app))?;

                let language = app.language.clone();
                let result = if app.initial {
                    app.session.start_story(&prompt, &language).await
                } else {
                    app.session.continue_story(&prompt, &language).await
                };

                match result {
                    Ok(appended) => {
                        app.initial = false;
                        app.scroll_to_bottom();
                        app.set_status(format!("{appended} new segments"));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "generation failed");
                        app.set_status(App::describe_error(&e));
                    }
                }
                app.generating = false;
            }
        }

        // Playback request
        if std::mem::take(&mut app.pending_play) {
            if app.session.story().is_empty() {
                app.set_status("Nothing to play yet");
            } else if app.is_audio_loading() {
                // A synthesis is already in flight
            } else {
                app.set_status("Preparing audio...");
                terminal.draw(|f| render(f, &app))?;
                match app.session.request_playback().await {
                    Ok(()) => app.set_status("Playing"),
                    Err(e) => {
                        tracing::error!(error = %e, "playback failed");
                        app.set_status(App::describe_error(&e));
                    }
                }
            }
        }

        // WAV download
        if std::mem::take(&mut app.pending_download) {
            if app.session.story().is_empty() {
                app.set_status("Nothing to save yet");
            } else {
                app.set_status("Preparing download...");
                terminal.draw(|f| render(f, &app))?;
                match app.session.export_wav(".").await {
                    Ok(path) => app.set_status(format!("Saved {}", path.display())),
                    Err(e) => {
                        tracing::error!(error = %e, "wav export failed");
                        app.set_status(App::describe_error(&e));
                    }
                }
            }
        }

        // Document export
        if std::mem::take(&mut app.pending_export) {
            if app.session.story().is_empty() {
                app.set_status("Nothing to save yet");
            } else {
                match app.session.export_document(".").await {
                    Ok(path) => app.set_status(format!("Saved {}", path.display())),
                    Err(e) => {
                        tracing::error!(error = %e, "document export failed");
                        app.set_status(App::describe_error(&e));
                    }
                }
            }
        }

        // Poll for events with a timeout so animations and playback
        // completion keep ticking
        if event::poll(Duration::from_millis(100))? {
            let ev = event::read()?;
            match handle_event(&mut app, ev) {
                EventResult::Quit => return Ok(()),
                EventResult::NeedsRedraw | EventResult::Continue => {}
            }
        } else {
            app.tick();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn print_help() {
    println!("Katha Sagar - AI audio-drama storyteller");
    println!();
    println!("USAGE:");
    println!("  katha [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help    Show this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("  GEMINI_API_KEY    API key for the story and speech service (required)");
    println!();
    println!("KEYS:");
    println!("  i         enter a story prompt, Enter submits");
    println!("  1-5       quick story directions (twist, emotion, dialogue, ...)");
    println!("  p         play or stop the audio drama");
    println!("  d         save the story audio as a .wav file");
    println!("  x         save the story as a document");
    println!("  :lang xx  switch the story language (e.g. :lang en)");
    println!("  n         start a new story");
    println!("  q         quit");
}
