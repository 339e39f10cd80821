//! Centralized status output for the CLI.
//!
//! All user-facing diagnostics go through [`Shell`]: cargo-style status
//! lines with a right-aligned bold header, plus `Warning:` and `Error:`
//! prefixes. Commands never write escape sequences themselves.

use std::fmt::Display;
use std::io::{self, IsTerminal};
use std::str::FromStr;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// --quiet: errors only
    Quiet,
    #[default]
    Normal,
    /// --verbose
    Verbose,
    /// -vv
    VeryVerbose,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Detect whether stderr is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "invalid color choice `{s}`; expected `auto`, `always`, or `never`"
            )),
        }
    }
}

/// Width the status header is right-aligned to.
const HEADER_WIDTH: usize = 12;

const BOLD_GREEN: &str = "\x1b[1;32m";
const BOLD_YELLOW: &str = "\x1b[1;33m";
const BOLD_RED: &str = "\x1b[1;31m";
const RESET: &str = "\x1b[0m";

/// Central shell for all CLI output. Constructed once in `main` and
/// passed by reference afterwards.
#[derive(Debug, Clone)]
pub struct Shell {
    verbosity: Verbosity,
    use_color: bool,
}

impl Shell {
    pub fn new(verbosity: Verbosity, color: ColorChoice) -> Self {
        let use_color = match color {
            ColorChoice::Auto => io::stderr().is_terminal(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        };
        Shell {
            verbosity,
            use_color,
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity >= Verbosity::Verbose
    }

    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Print a cargo-style status line: `{header:>12} {message}`.
    pub fn status(&self, header: impl Display, msg: impl Display) {
        if self.is_quiet() {
            return;
        }
        let width = HEADER_WIDTH;
        if self.use_color {
            eprintln!("{BOLD_GREEN}{header:>width$}{RESET} {msg}");
        } else {
            eprintln!("{header:>width$} {msg}");
        }
    }

    pub fn warn(&self, msg: impl Display) {
        if self.is_quiet() {
            return;
        }
        if self.use_color {
            eprintln!("{BOLD_YELLOW}Warning:{RESET} {msg}");
        } else {
            eprintln!("Warning: {msg}");
        }
    }

    /// Errors are printed even in quiet mode.
    pub fn error(&self, msg: impl Display) {
        if self.use_color {
            eprintln!("{BOLD_RED}Error:{RESET} {msg}");
        } else {
            eprintln!("Error: {msg}");
        }
    }

    /// Highlight the `Caused by:` headers of an error chain rendering.
    pub fn colorize_cause_chain(&self, rendered: &str) -> String {
        if !self.use_color {
            return rendered.to_string();
        }
        rendered.replace("Caused by:", &format!("{BOLD_YELLOW}Caused by:{RESET}"))
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(Verbosity::Normal, ColorChoice::Never)
    }
}
