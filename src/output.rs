//! Terminal rendering of engine events.

use crate::pipeline::events::{EngineEvent, EventSink};
use owo_colors::OwoColorize;
use std::io::{self, IsTerminal, Write};
use std::sync::Mutex;

/// Clear the current terminal line (replaces an in-place partial transcript)
pub fn clear_line() {
    eprint!("\r\x1b[2K");
}

/// Render one event as a single line, optionally colored.
pub fn render_event(event: &EngineEvent, color: bool) -> String {
    match event {
        EngineEvent::Status(message) => {
            if color {
                format!("{}", message.dimmed())
            } else {
                message.clone()
            }
        }
        EngineEvent::Partial(text) => {
            if color {
                format!("… {}", text.dimmed().italic())
            } else {
                format!("… {}", text)
            }
        }
        EngineEvent::Phrase(phrase) => {
            if color {
                format!("{} \"{}\"", "▶".green(), phrase.text.bold())
            } else {
                format!("▶ \"{}\"", phrase.text)
            }
        }
        EngineEvent::Error { stage, message } => {
            if color {
                format!("{} [{}] {}", "✗".red(), stage.yellow(), message)
            } else {
                format!("✗ [{}] {}", stage, message)
            }
        }
    }
}

/// Event sink that writes to stderr.
///
/// Partials are drawn in place on one line; other events end the line.
pub struct TerminalSink {
    color: bool,
    quiet: bool,
    partial_open: Mutex<bool>,
}

impl TerminalSink {
    pub fn new(quiet: bool) -> Self {
        Self {
            color: io::stderr().is_terminal(),
            quiet,
            partial_open: Mutex::new(false),
        }
    }

    fn shown(&self, event: &EngineEvent) -> bool {
        // Quiet keeps phrases and errors
        !self.quiet || matches!(event, EngineEvent::Phrase(_) | EngineEvent::Error { .. })
    }
}

impl EventSink for TerminalSink {
    fn emit(&self, event: EngineEvent) {
        if !self.shown(&event) {
            return;
        }
        let line = render_event(&event, self.color);
        let mut partial_open = self.partial_open.lock().unwrap_or_else(|e| e.into_inner());
        if *partial_open {
            clear_line();
        }
        if matches!(event, EngineEvent::Partial(_)) && self.color {
            eprint!("{}", line);
            let _ = io::stderr().flush();
            *partial_open = true;
        } else {
            eprintln!("{}", line);
            *partial_open = false;
        }
    }
}
