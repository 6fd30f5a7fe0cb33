//! Argument lexing: global flags with stop-early semantics, and the default
//! tokenizer for command-level flags.
//!
//! Global flags are only recognized before the first token that is not one
//! of them, so `app greet --verbose` hands `--verbose` to `greet` instead of
//! switching the whole run to verbose. Everything after a literal `--` is
//! passed through untouched.

use std::fmt;
use std::path::PathBuf;

use arbor_common::ColorChoice;
use clap_lex::RawArgs;
use serde::Serialize;
use serde_json::Value;

use crate::Flags;

/// Reserved raw-flag key holding the tokens after `--`.
pub const PASSTHROUGH_KEY: &str = "--";

/// How chatty command output should be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

/// Format for command output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Text,
    Json,
    Yaml,
}

impl OutputMode {
    /// `json` and `yaml` select those modes; anything else is text.
    pub fn from_flag(value: Option<&str>) -> Self {
        match value {
            Some("json") => OutputMode::Json,
            Some("yaml") => OutputMode::Yaml,
            _ => OutputMode::Text,
        }
    }

    pub fn is_structured(self) -> bool {
        !matches!(self, OutputMode::Text)
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputMode::Text => "text",
            OutputMode::Json => "json",
            OutputMode::Yaml => "yaml",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobalFlag {
    Help,
    Version,
    Quiet,
    Verbose,
    Color,
    Output,
    Config,
    TraceEndpoint,
}

impl GlobalFlag {
    fn from_long(name: &str) -> Option<Self> {
        Some(match name {
            "help" => GlobalFlag::Help,
            "version" => GlobalFlag::Version,
            "quiet" => GlobalFlag::Quiet,
            "verbose" => GlobalFlag::Verbose,
            "color" => GlobalFlag::Color,
            "output" => GlobalFlag::Output,
            "config" => GlobalFlag::Config,
            "trace-endpoint" => GlobalFlag::TraceEndpoint,
            _ => return None,
        })
    }

    fn from_short(c: char) -> Option<Self> {
        Some(match c {
            'h' => GlobalFlag::Help,
            'V' => GlobalFlag::Version,
            'q' => GlobalFlag::Quiet,
            'v' => GlobalFlag::Verbose,
            _ => return None,
        })
    }

    fn key(self) -> &'static str {
        match self {
            GlobalFlag::Help => "help",
            GlobalFlag::Version => "version",
            GlobalFlag::Quiet => "quiet",
            GlobalFlag::Verbose => "verbose",
            GlobalFlag::Color => "color",
            GlobalFlag::Output => "output",
            GlobalFlag::Config => "config",
            GlobalFlag::TraceEndpoint => "trace_endpoint",
        }
    }

    fn takes_value(self) -> bool {
        matches!(
            self,
            GlobalFlag::Color | GlobalFlag::Output | GlobalFlag::Config | GlobalFlag::TraceEndpoint
        )
    }
}

/// Result of the global flag pass over the argument vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalArgs {
    pub help: bool,
    pub version: bool,
    pub quiet: bool,
    pub verbose: bool,
    pub color: Option<String>,
    pub output: Option<String>,
    pub config: Option<PathBuf>,
    pub trace_endpoint: Option<String>,
    /// Tokens from the first non-global token up to `--`.
    pub rest: Vec<String>,
    /// Tokens after `--`, if the separator was present.
    pub passthrough: Option<Vec<String>>,
    given: Flags,
}

impl GlobalArgs {
    /// Split `argv` (without the program name) into global flags and the rest.
    pub fn parse<S: AsRef<str>>(argv: &[S]) -> Self {
        let raw = RawArgs::new(argv.iter().map(|s| s.as_ref()));
        let mut cursor = raw.cursor();
        let mut parsed = GlobalArgs::default();

        while let Some(arg) = raw.peek(&cursor) {
            if arg.is_escape() {
                break;
            }

            if let Some((name, inline)) = arg.to_long() {
                let Some(flag) = name.ok().and_then(GlobalFlag::from_long) else {
                    break;
                };
                raw.next(&mut cursor);

                let inline = inline.map(|v| v.to_string_lossy().into_owned());
                let value = if flag.takes_value() && inline.is_none() {
                    // `--output json` form; never swallow the separator
                    match raw.peek(&cursor) {
                        Some(next) if !next.is_escape() => {
                            raw.next(&mut cursor);
                            Some(next.to_value_os().to_string_lossy().into_owned())
                        }
                        _ => None,
                    }
                } else {
                    inline
                };
                parsed.apply(flag, value);
                continue;
            }

            let text = arg.to_value_os().to_string_lossy();
            match short_cluster(&text) {
                Some(flags) => {
                    raw.next(&mut cursor);
                    for flag in flags {
                        parsed.apply(flag, None);
                    }
                }
                None => break,
            }
        }

        while let Some(arg) = raw.next(&mut cursor) {
            if arg.is_escape() {
                parsed.passthrough = Some(
                    raw.remaining(&mut cursor)
                        .map(|s| s.to_string_lossy().into_owned())
                        .collect(),
                );
                break;
            }
            parsed
                .rest
                .push(arg.to_value_os().to_string_lossy().into_owned());
        }

        parsed
    }

    fn apply(&mut self, flag: GlobalFlag, value: Option<String>) {
        if flag.takes_value() {
            let value = value.unwrap_or_default();
            self.given
                .insert(flag.key().to_string(), Value::String(value.clone()));
            match flag {
                GlobalFlag::Color => self.color = Some(value),
                GlobalFlag::Output => self.output = Some(value),
                GlobalFlag::Config => self.config = Some(PathBuf::from(value)),
                GlobalFlag::TraceEndpoint => self.trace_endpoint = Some(value),
                _ => {}
            }
            return;
        }

        let on = value.as_deref().is_none_or(parse_switch);
        self.given.insert(flag.key().to_string(), Value::Bool(on));
        match flag {
            GlobalFlag::Help => self.help = on,
            GlobalFlag::Version => self.version = on,
            GlobalFlag::Quiet => self.quiet = on,
            GlobalFlag::Verbose => self.verbose = on,
            _ => {}
        }
    }

    /// Output mode selected by `--output`.
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from_flag(self.output.as_deref())
    }

    /// Quiet wins over verbose.
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    /// Color preference; unknown values fall back to auto.
    pub fn color_choice(&self) -> ColorChoice {
        self.color
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or_default()
    }

    /// Global flags that were explicitly present on the command line.
    pub fn given_flags(&self) -> &Flags {
        &self.given
    }
}

fn parse_switch(value: &str) -> bool {
    !matches!(
        value.to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

/// `-qv` style cluster where every letter is a known global switch.
fn short_cluster(text: &str) -> Option<Vec<GlobalFlag>> {
    let letters = text.strip_prefix('-')?;
    if letters.is_empty() || letters.starts_with('-') {
        return None;
    }
    letters.chars().map(GlobalFlag::from_short).collect()
}

fn is_negative_number(text: &str) -> bool {
    text.strip_prefix('-')
        .is_some_and(|rest| !rest.is_empty() && rest.parse::<f64>().is_ok())
}

/// Normalize a flag name to its raw-flag key (`dry-run` becomes `dry_run`).
pub fn flag_key(name: &str) -> String {
    name.replace('-', "_")
}

/// Split residual tokens into positional segments and command flags.
///
/// `--key=value` sets a string, `--key` sets true, `--no-key` sets false,
/// `-abc` sets `a`, `b` and `c` to true. A lone `-` and negative numbers are
/// positional. Later occurrences overwrite earlier ones.
pub fn split_command_args<S: AsRef<str>>(tokens: &[S]) -> (Vec<String>, Flags) {
    let raw = RawArgs::new(tokens.iter().map(|s| s.as_ref()));
    let mut cursor = raw.cursor();
    let mut positionals = Vec::new();
    let mut flags = Flags::new();

    while let Some(arg) = raw.next(&mut cursor) {
        let text = arg.to_value_os().to_string_lossy().into_owned();

        if let Some((Ok(name), inline)) = arg.to_long()
            && !name.is_empty()
        {
            match inline {
                Some(value) => {
                    flags.insert(
                        flag_key(name),
                        Value::String(value.to_string_lossy().into_owned()),
                    );
                }
                None => match name.strip_prefix("no-") {
                    Some(negated) if !negated.is_empty() => {
                        flags.insert(flag_key(negated), Value::Bool(false));
                    }
                    _ => {
                        flags.insert(flag_key(name), Value::Bool(true));
                    }
                },
            }
            continue;
        }

        if text.len() > 1
            && text.starts_with('-')
            && !text.starts_with("--")
            && !is_negative_number(&text)
        {
            for c in text.chars().skip(1) {
                flags.insert(c.to_string(), Value::Bool(true));
            }
            continue;
        }

        positionals.push(text);
    }

    (positionals, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(args: &[&str]) -> GlobalArgs {
        GlobalArgs::parse(args)
    }

    #[test]
    fn test_global_switches() {
        let g = parse(&["-q", "--verbose", "--output=json", "user", "add"]);
        assert!(g.quiet);
        assert!(g.verbose);
        assert_eq!(g.output_mode(), OutputMode::Json);
        assert_eq!(g.verbosity(), Verbosity::Quiet);
        assert_eq!(g.rest, vec!["user", "add"]);
        assert!(g.passthrough.is_none());
    }

    #[test]
    fn test_value_in_next_token() {
        let g = parse(&["--config", "/tmp/app.yaml", "--color", "never", "greet"]);
        assert_eq!(g.config, Some(PathBuf::from("/tmp/app.yaml")));
        assert_eq!(g.color_choice(), ColorChoice::Never);
        assert_eq!(g.rest, vec!["greet"]);
    }

    #[test]
    fn test_stop_early_at_positional() {
        let g = parse(&["greet", "--verbose", "--help"]);
        assert!(!g.verbose);
        assert!(!g.help);
        assert_eq!(g.rest, vec!["greet", "--verbose", "--help"]);
    }

    #[test]
    fn test_stop_early_at_unknown_flag() {
        let g = parse(&["-v", "--name=Alice", "-q", "greet"]);
        assert!(g.verbose);
        assert!(!g.quiet);
        assert_eq!(g.rest, vec!["--name=Alice", "-q", "greet"]);
    }

    #[test]
    fn test_short_cluster() {
        let g = parse(&["-qv", "greet"]);
        assert!(g.quiet && g.verbose);

        let g = parse(&["-qx", "greet"]);
        assert!(!g.quiet);
        assert_eq!(g.rest, vec!["-qx", "greet"]);
    }

    #[test]
    fn test_passthrough_after_separator() {
        let g = parse(&["run", "script", "--", "--help", "-v", "x"]);
        assert!(!g.help);
        assert_eq!(g.rest, vec!["run", "script"]);
        assert_eq!(
            g.passthrough,
            Some(vec!["--help".to_string(), "-v".to_string(), "x".to_string()])
        );

        let g = parse(&["--", "--version"]);
        assert!(!g.version);
        assert!(g.rest.is_empty());
        assert_eq!(g.passthrough, Some(vec!["--version".to_string()]));
    }

    #[test]
    fn test_value_flag_does_not_eat_separator() {
        let g = parse(&["--output", "--", "x"]);
        assert_eq!(g.output.as_deref(), Some(""));
        assert_eq!(g.output_mode(), OutputMode::Text);
        assert_eq!(g.passthrough, Some(vec!["x".to_string()]));
    }

    #[test]
    fn test_given_flags_only_explicit() {
        let g = parse(&["--verbose", "--trace-endpoint=http://otel:4318", "greet"]);
        assert_eq!(
            serde_json::Value::Object(g.given_flags().clone()),
            json!({"verbose": true, "trace_endpoint": "http://otel:4318"})
        );
        assert_eq!(g.trace_endpoint.as_deref(), Some("http://otel:4318"));
    }

    #[test]
    fn test_switch_with_explicit_value() {
        let g = parse(&["--verbose=false", "greet"]);
        assert!(!g.verbose);
        assert_eq!(g.given_flags()["verbose"], false);
    }

    #[test]
    fn test_output_mode_resolution() {
        assert_eq!(OutputMode::from_flag(Some("yaml")), OutputMode::Yaml);
        assert_eq!(OutputMode::from_flag(Some("JSON")), OutputMode::Text);
        assert_eq!(OutputMode::from_flag(Some("xml")), OutputMode::Text);
        assert_eq!(OutputMode::from_flag(None), OutputMode::Text);
    }

    #[test]
    fn test_split_command_args() {
        let (positionals, flags) = split_command_args(&[
            "add",
            "--name=Alice",
            "--dry-run",
            "--no-color",
            "-fx",
            "-",
            "-5",
            "bob",
        ]);
        assert_eq!(positionals, vec!["add", "-", "-5", "bob"]);
        assert_eq!(
            serde_json::Value::Object(flags),
            json!({
                "name": "Alice",
                "dry_run": true,
                "color": false,
                "f": true,
                "x": true,
            })
        );
    }

    #[test]
    fn test_split_later_wins() {
        let (_, flags) = split_command_args(&["--name=a", "--name=b"]);
        assert_eq!(flags["name"], "b");
    }
}
