//! Story document export.
//!
//! Renders the storyboard as a styled HTML document that word processors
//! open directly. Dialogue speakers get stable colors derived from their
//! names; narration is set apart in italics.

use crate::story::{is_narrator_name, StoryState};

const SPEAKER_COLORS: [&str; 7] = [
    "#e11d48", "#4f46e5", "#059669", "#d97706", "#0284c7", "#7c3aed", "#0d9488",
];

const NARRATOR_COLOR: &str = "#71717a";

const DEFAULT_TITLE: &str = "Katha Sagar";

/// Stable palette index for a speaker name; `None` for the narrator.
pub fn speaker_palette_index(name: &str) -> Option<usize> {
    if name.is_empty() || is_narrator_name(name) {
        return None;
    }
    let mut hash: i32 = 0;
    for c in name.chars() {
        hash = (c as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash));
    }
    Some(hash.unsigned_abs() as usize % SPEAKER_COLORS.len())
}

/// Hex color for a speaker name.
pub fn speaker_color(name: &str) -> &'static str {
    match speaker_palette_index(name) {
        Some(index) => SPEAKER_COLORS[index],
        None => NARRATOR_COLOR,
    }
}

/// Render the story as a self-contained HTML document.
pub fn render_document(story: &StoryState) -> String {
    let mut body = String::new();
    for segment in story.segments() {
        let speaker = segment.speaker_or_narrator();
        if segment.is_narration() {
            body.push_str(&format!(
                "<div class=\"narration\">{}</div>\n",
                escape(&segment.text)
            ));
        } else {
            let color = speaker_color(speaker);
            let emotion = segment.emotion.as_deref().unwrap_or("neutral");
            body.push_str(&format!(
                "<div class=\"dialogue\" style=\"border-color:{color}\">\
                 <div class=\"speaker\" style=\"color:{color}\">{} ({})</div>\
                 <div class=\"line\">{}</div></div>\n",
                escape(speaker),
                escape(emotion),
                escape(&segment.text)
            ));
        }
    }

    format!(
        "<html><head><meta charset='utf-8'><style>\n\
         body {{ font-family: 'Arial'; padding: 40px; }}\n\
         .narration {{ color: #52525b; font-style: italic; margin-bottom: 20px; text-align: center; }}\n\
         .dialogue {{ border-left: 4px solid; padding-left: 15px; margin-bottom: 15px; }}\n\
         .speaker {{ font-weight: bold; font-size: 10pt; text-transform: uppercase; }}\n\
         .line {{ font-size: 16pt; }}\n\
         </style></head><body>\n<h1>{}</h1>\n{}</body></html>",
        escape(story.title().unwrap_or(DEFAULT_TITLE)),
        body
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
