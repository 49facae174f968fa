//! Output formatting for CLI commands
//!
//! Text goes to stdout for people; JSON goes to stdout as one line per
//! command for scripts. Diagnostics always go to stderr.

use serde::Serialize;

use crate::storage;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl From<storage::OutputFormat> for OutputFormat {
    fn from(format: storage::OutputFormat) -> Self {
        match format {
            storage::OutputFormat::Text => OutputFormat::Text,
            storage::OutputFormat::Json => OutputFormat::Json,
        }
    }
}

/// Renders command results in the selected format
pub struct Output {
    format: OutputFormat,
    verbose: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    /// Confirms a completed action
    pub fn success(&self, message: &str) {
        if self.is_json() {
            self.data(&serde_json::json!({ "success": true, "message": message }));
        } else {
            println!("{}", message);
        }
    }

    /// Prints a value as JSON (compact for `json`, pretty for `text`)
    pub fn data<T: Serialize>(&self, data: &T) {
        let encoded = match self.format {
            OutputFormat::Json => serde_json::to_string(data),
            OutputFormat::Text => serde_json::to_string_pretty(data),
        };
        match encoded {
            Ok(json) => println!("{}", json),
            Err(err) => eprintln!("Error: failed to encode output: {}", err),
        }
    }

    /// Prints `data` as JSON, or hands it to `text` to render for people
    pub fn render<T: Serialize>(&self, data: &T, text: impl FnOnce(&T)) {
        if self.is_json() {
            self.data(data);
        } else {
            text(data);
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Prints a debug line tagged with `context` when --verbose is set
    pub fn verbose_ctx(&self, context: &str, message: &str) {
        if self.verbose {
            eprintln!("[verbose:{}] {}", context, message);
        }
    }
}
