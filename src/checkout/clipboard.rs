//! Copying the PIX payment code.
//!
//! The primary sink is the terminal clipboard (OSC 52), which needs a TTY.
//! When it fails the code is printed on its own line so it can be selected
//! by hand.

use std::io::{IsTerminal, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard write failed: {0}")]
    Io(#[from] std::io::Error),
}

pub trait ClipboardSink {
    /// # Errors
    ///
    /// Returns an error when the text could not be handed over.
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMethod {
    Primary,
    Fallback,
}

/// Try `primary`, then `fallback`.
///
/// # Errors
///
/// Returns the fallback's error when both sinks fail.
pub fn copy_with_fallback(
    primary: &dyn ClipboardSink,
    fallback: &dyn ClipboardSink,
    text: &str,
) -> Result<CopyMethod, ClipboardError> {
    match primary.write_text(text) {
        Ok(()) => Ok(CopyMethod::Primary),
        Err(e) => {
            warn!(error = %e, "clipboard copy failed; using fallback");
            fallback.write_text(text).map(|()| CopyMethod::Fallback)
        }
    }
}

/// OSC 52 escape sequence understood by most terminal emulators.
pub struct TerminalClipboard;

impl ClipboardSink for TerminalClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut stdout = std::io::stdout();
        if !stdout.is_terminal() {
            return Err(ClipboardError::Unavailable("stdout is not a terminal".into()));
        }
        write!(stdout, "{}", osc52_sequence(text))?;
        stdout.flush()?;
        Ok(())
    }
}

/// Prints the code for manual selection.
pub struct PrintedCode;

impl ClipboardSink for PrintedCode {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut stdout = std::io::stdout();
        writeln!(stdout, "\n{text}\n")?;
        stdout.flush()?;
        Ok(())
    }
}

#[must_use]
pub fn osc52_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", STANDARD.encode(text))
}

#[cfg(test)]
#[path = "clipboard_test.rs"]
mod tests;
