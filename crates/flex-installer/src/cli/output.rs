//! Output formatting for CLI.

use console::{style, Term};
use std::io::Write;

/// Verbosity levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
    Debug,
}

impl Verbosity {
    /// Map `-q` / repeated `-v` flags to a level
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Verbosity::Quiet;
        }
        match verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    }
}

/// Output handler writing user-facing messages to stderr
pub struct Output {
    term: Term,
    verbosity: Verbosity,
    json_mode: bool,
}

impl Output {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
            verbosity: Verbosity::Normal,
            json_mode: false,
        }
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// In JSON mode only [`Output::json`] and errors are printed
    pub fn with_json_mode(mut self, json: bool) -> Self {
        self.json_mode = json;
        self
    }

    fn should_output(&self, min_verbosity: Verbosity) -> bool {
        !self.json_mode && self.verbosity >= min_verbosity
    }

    pub fn writeln(&self, message: &str) {
        if self.should_output(Verbosity::Normal) {
            let _ = writeln!(&self.term, "{}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_output(Verbosity::Normal) {
            let _ = writeln!(&self.term, "{}", style(message).cyan());
        }
    }

    pub fn success(&self, message: &str) {
        if self.should_output(Verbosity::Normal) {
            let _ = writeln!(&self.term, "{} {}", style("SUCCESS!").green().bold(), message);
        }
    }

    /// Warnings survive `--quiet`
    pub fn warning(&self, message: &str) {
        if self.should_output(Verbosity::Quiet) {
            let _ = writeln!(&self.term, "{} {}", style("Warning:").yellow().bold(), message);
        }
    }

    pub fn error(&self, message: &str) {
        let _ = writeln!(&self.term, "{} {}", style("Error:").red().bold(), message);
    }

    pub fn verbose(&self, message: &str) {
        if self.should_output(Verbosity::Verbose) {
            let _ = writeln!(&self.term, "{}", style(message).dim());
        }
    }

    pub fn list_item(&self, prefix: &str, message: &str) {
        if self.should_output(Verbosity::Normal) {
            let _ = writeln!(&self.term, "  {} {}", style(prefix).green(), message);
        }
    }

    /// Print `data` as pretty JSON on stdout
    pub fn json<T: serde::Serialize>(&self, data: &T) {
        if self.json_mode {
            if let Ok(json) = serde_json::to_string_pretty(data) {
                println!("{}", json);
            }
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    pub fn is_json(&self) -> bool {
        self.json_mode
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
