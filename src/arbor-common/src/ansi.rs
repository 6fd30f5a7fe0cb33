//! ANSI escape code handling utilities.
//!
//! Provides terminal capability detection and the handful of styles the help
//! renderer uses. Honors the NO_COLOR standard: https://no-color.org/

use std::io::IsTerminal;
use std::str::FromStr;

/// SGR codes used by arbor output.
pub mod codes {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
}

/// User preference for colored output, as given by `--color`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Resolve the choice against the current stdout.
    pub fn resolve(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => should_colorize(),
        }
    }
}

impl FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            other => Err(format!("invalid color mode: {other}")),
        }
    }
}

/// Check if stdout should output colors/ANSI codes.
///
/// Returns false when stdout is not a terminal or NO_COLOR is set.
pub fn should_colorize() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::io::stdout().is_terminal()
}

/// Wrap `text` in `code` when `enabled`, otherwise return it unchanged.
pub fn paint(text: &str, code: &str, enabled: bool) -> String {
    if enabled {
        format!("{code}{text}{}", codes::RESET)
    } else {
        text.to_string()
    }
}

pub fn bold(text: &str, enabled: bool) -> String {
    paint(text, codes::BOLD, enabled)
}

pub fn dim(text: &str, enabled: bool) -> String {
    paint(text, codes::DIM, enabled)
}

/// Strip ANSI CSI escape sequences from a string.
pub fn strip_ansi_codes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            // Skip parameters up to and including the final letter
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        result.push(c);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_choice_parse() {
        assert_eq!("always".parse::<ColorChoice>(), Ok(ColorChoice::Always));
        assert_eq!("NEVER".parse::<ColorChoice>(), Ok(ColorChoice::Never));
        assert_eq!("auto".parse::<ColorChoice>(), Ok(ColorChoice::Auto));
        assert!("sometimes".parse::<ColorChoice>().is_err());
    }

    #[test]
    fn test_explicit_choices_resolve() {
        assert!(ColorChoice::Always.resolve());
        assert!(!ColorChoice::Never.resolve());
    }

    #[test]
    fn test_paint_disabled_is_identity() {
        assert_eq!(bold("USAGE", false), "USAGE");
        assert_eq!(dim("x", false), "x");
    }

    #[test]
    fn test_strip_roundtrip() {
        let painted = bold("COMMANDS", true);
        assert_ne!(painted, "COMMANDS");
        assert_eq!(strip_ansi_codes(&painted), "COMMANDS");
        assert_eq!(strip_ansi_codes("plain"), "plain");
    }
}
