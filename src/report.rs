//! User-facing status lines.
//!
//! Pipeline code reports through the `Reporter` trait; `main` picks the
//! backend once at startup.

use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use num_format::{Locale, ToFormattedString};

/// Sink for status output
pub trait Reporter {
    /// Progress/informational line
    fn info(&self, line: &str);
    /// Outcome line
    fn result(&self, line: &str);
}

/// Writes status lines to stderr, colored when stderr is a terminal
pub struct TerminalReporter {
    color: bool,
}

impl TerminalReporter {
    pub fn new() -> Self {
        let color = std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_tty();
        Self { color }
    }

    fn info_line(&self, line: &str) -> String {
        if self.color {
            format!("{} {}", " i ".on_blue(), line)
        } else {
            format!("[i] {}", line)
        }
    }

    fn result_line(&self, line: &str) -> String {
        if self.color {
            format!("{} {}", "==>".green(), line)
        } else {
            format!("==> {}", line)
        }
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for TerminalReporter {
    fn info(&self, line: &str) {
        eprintln!("{}", self.info_line(line));
    }

    fn result(&self, line: &str) {
        eprintln!("{}", self.result_line(line));
    }
}

/// Discards status lines (`-q`)
pub struct QuietReporter;

impl Reporter for QuietReporter {
    fn info(&self, _line: &str) {}
    fn result(&self, _line: &str) {}
}

/// `12345` -> `12,345`
pub fn format_count(count: usize) -> String {
    count.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_lines() {
        let reporter = TerminalReporter { color: false };
        assert_eq!(reporter.info_line("saving"), "[i] saving");
        assert_eq!(reporter.result_line("done"), "==> done");
    }

    #[test]
    fn test_colored_lines_keep_text() {
        let reporter = TerminalReporter { color: true };
        let line = reporter.result_line("done");
        assert!(line.contains("==>"));
        assert!(line.ends_with(" done"));
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(7), "7");
        assert_eq!(format_count(1234567), "1,234,567");
    }
}
