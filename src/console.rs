//! Console output of the session.
//!
//! Interpretation results and the final `Quit` line go through a
//! [`Printer`] so they stay separate from log output.

use std::io::Write;

/// Line-oriented output sink.
pub trait Printer: Send {
    /// Prints one line.
    fn print_line(&mut self, line: &str);
}

/// Writes lines to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutPrinter;

impl Printer for StdoutPrinter {
    fn print_line(&mut self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        if writeln!(stdout, "{line}").and_then(|()| stdout.flush()).is_err() {
            tracing::debug!("stdout closed, dropping console line");
        }
    }
}

impl Printer for Vec<String> {
    fn print_line(&mut self, line: &str) {
        self.push(line.to_string());
    }
}
