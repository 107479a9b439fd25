//! Event output
//!
//! Text output prints one line per event: the path followed by its flag
//! names. JSON output prints one object per line.

use anyhow::{Context, Result};
use clap::ValueEnum;
use dirwatch_core::ChangeEvent;
use owo_colors::OwoColorize;
use std::io::{self, IsTerminal, Write};
use tracing::warn;
use watcher::EventHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Render one event as a single line, without the trailing newline
pub fn format_event(event: &ChangeEvent, format: OutputFormat, color: bool) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_text(event, color)),
        OutputFormat::Json => serde_json::to_string(event).context("Failed to encode event"),
    }
}

fn format_text(event: &ChangeEvent, color: bool) -> String {
    match (event.flags.is_empty(), color) {
        (true, false) => event.path.clone(),
        (true, true) => event.path.cyan().to_string(),
        (false, false) => format!("{} {}", event.path, event.flags),
        (false, true) => format!("{} {}", event.path.cyan(), event.flags.yellow()),
    }
}

/// Writes every delivered event to `out`
pub struct EventPrinter<W: Write> {
    out: W,
    format: OutputFormat,
    color: bool,
}

impl EventPrinter<io::Stdout> {
    /// Print to stdout, coloured when it is a terminal and `NO_COLOR` is unset
    pub fn stdout(format: OutputFormat) -> Self {
        let out = io::stdout();
        let color = format == OutputFormat::Text
            && out.is_terminal()
            && std::env::var_os("NO_COLOR").is_none();
        Self::new(out, format, color)
    }
}

impl<W: Write> EventPrinter<W> {
    pub fn new(out: W, format: OutputFormat, color: bool) -> Self {
        Self { out, format, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EventHandler for EventPrinter<W> {
    fn handle_events(&mut self, events: Vec<ChangeEvent>) {
        for event in &events {
            let line = match format_event(event, self.format, self.color) {
                Ok(line) => line,
                Err(e) => {
                    warn!("{:#}", e);
                    continue;
                }
            };

            if let Err(e) = writeln!(self.out, "{}", line) {
                warn!("Failed to write event: {}", e);
                return;
            }
        }

        if let Err(e) = self.out.flush() {
            warn!("Failed to flush output: {}", e);
        }
    }
}
