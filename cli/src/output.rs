//! Where command results go: stdout for results (JSON with `--json`), stderr for summaries.

use std::{fmt::Display, sync::OnceLock};

use color_eyre::eyre::Result;
use console::style;
use serde::Serialize;

/// How command results are printed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum OutputFormat {
    /// Markup and trees for people, followed by summaries on stderr.
    #[default]
    Human,
    /// One pretty-printed JSON document on stdout and nothing else.
    Json,
}

impl OutputFormat {
    /// Picks the format from the `--json` flag.
    #[must_use]
    pub const fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Human }
    }
}

static FORMAT: OnceLock<OutputFormat> = OnceLock::new();

/// Sets the format for the rest of the process. Later calls are ignored.
pub fn init(format: OutputFormat) {
    let _ = FORMAT.set(format);
}

/// The process-wide format, [`OutputFormat::Human`] until [`init`] runs.
#[must_use]
pub fn format() -> OutputFormat {
    FORMAT.get().copied().unwrap_or_default()
}

/// Prints a command result: `payload` as JSON, or through `human` otherwise.
///
/// # Errors
/// Returns an error if the payload cannot be serialized.
pub fn report<T: Serialize>(payload: &T, human: impl FnOnce(&T)) -> Result<()> {
    match format() {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(payload)?),
        OutputFormat::Human => human(payload),
    }
    Ok(())
}

/// Writes a labelled summary line to stderr. Suppressed in JSON mode so stdout stays parseable
/// when both streams are captured together.
pub fn summary(label: &str, message: impl Display) {
    if format() == OutputFormat::Human {
        eprintln!("{} {message}", style(label).bold());
    }
}
