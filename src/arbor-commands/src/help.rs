//! Help output generated from the command tree.

use arbor_common::ansi;
use serde::Serialize;

use crate::args::{OutputMode, Verbosity};
use crate::dispatch::AppInfo;
use crate::tree::{CommandEntry, CommandTree};
use crate::validate::FlagDoc;

/// Global options understood by every dispatcher, as shown in help.
const GLOBAL_OPTIONS: &[(&str, &str)] = &[
    ("-h, --help", "Print help"),
    ("-V, --version", "Print version"),
    ("-q, --quiet", "Only print essential output"),
    ("-v, --verbose", "Print additional detail"),
    ("--color <auto|always|never>", "When to use terminal colors"),
    ("--output <text|json|yaml>", "Output format"),
    ("--config <path>", "Read configuration from <path>"),
    ("--trace-endpoint <url>", "Export command traces to <url>"),
];

const INDENT: &str = "    ";
const GAP: usize = 4;

/// Structured help, serialized for `--output json|yaml`.
#[derive(Debug, Clone, Serialize)]
pub struct HelpDocument {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub usage: String,
    pub commands: Vec<CommandDoc>,
    pub options: Vec<OptionDoc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandDoc {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<FlagDoc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionDoc {
    pub flag: String,
    pub description: String,
}

/// Renders help for an application's command tree.
pub struct HelpRenderer<'a> {
    app: &'a AppInfo,
    tree: &'a CommandTree,
    verbosity: Verbosity,
    colored: bool,
}

impl<'a> HelpRenderer<'a> {
    pub fn new(app: &'a AppInfo, tree: &'a CommandTree) -> Self {
        Self {
            app,
            tree,
            verbosity: Verbosity::Normal,
            colored: false,
        }
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn colored(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    pub fn usage(&self) -> String {
        format!("{} [OPTIONS] <COMMAND> [ARGS]...", self.app.name)
    }

    /// Help in the given output mode.
    pub fn render_for(&self, mode: OutputMode) -> String {
        let rendered = match mode {
            OutputMode::Text => return self.render(),
            OutputMode::Json => {
                serde_json::to_string_pretty(&self.document()).map_err(|e| e.to_string())
            }
            OutputMode::Yaml => serde_yaml::to_string(&self.document()).map_err(|e| e.to_string()),
        };
        rendered.unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize help document: {}", e);
            self.render()
        })
    }

    /// Structured help for every visible command.
    pub fn document(&self) -> HelpDocument {
        let commands = self
            .tree
            .visible_commands()
            .iter()
            .map(|entry| CommandDoc {
                path: entry.display_path(),
                description: entry.node.options().and_then(|o| o.description.clone()),
                aliases: self.aliases_of(entry),
                examples: entry
                    .node
                    .options()
                    .map(|o| o.examples.clone())
                    .unwrap_or_default(),
                flags: flag_docs(entry),
            })
            .collect();

        HelpDocument {
            name: self.app.name.clone(),
            version: self.app.version.clone(),
            description: self.app.description.clone(),
            usage: self.usage(),
            commands,
            options: GLOBAL_OPTIONS
                .iter()
                .map(|(flag, description)| OptionDoc {
                    flag: flag.to_string(),
                    description: description.to_string(),
                })
                .collect(),
        }
    }

    /// Plain text help.
    pub fn render(&self) -> String {
        let entries = self.tree.visible_commands();
        let gap = " ".repeat(GAP);
        let paths: Vec<String> = entries.iter().map(CommandEntry::display_path).collect();
        let mut out = String::new();

        if self.verbosity == Verbosity::Quiet {
            self.heading(&mut out, "USAGE:");
            out.push_str(&format!("{INDENT}{}\n", self.usage()));
            if !paths.is_empty() {
                out.push('\n');
                self.heading(&mut out, "COMMANDS:");
                for path in &paths {
                    out.push_str(&format!("{INDENT}{path}\n"));
                }
            }
            return out;
        }

        out.push_str(&format!(
            "{} {}\n",
            ansi::bold(&self.app.name, self.colored),
            self.app.version
        ));
        if let Some(description) = &self.app.description {
            out.push_str(description);
            out.push('\n');
        }
        out.push('\n');

        self.heading(&mut out, "USAGE:");
        out.push_str(&format!("{INDENT}{}\n", self.usage()));

        if !entries.is_empty() {
            out.push('\n');
            self.heading(&mut out, "COMMANDS:");
            let width = paths.iter().map(|p| p.chars().count()).max().unwrap_or(0);
            for (entry, path) in entries.iter().zip(&paths) {
                let description = entry
                    .node
                    .options()
                    .and_then(|o| o.description.as_deref())
                    .unwrap_or("");
                out.push_str(format!("{INDENT}{path:<width$}{gap}{description}").trim_end());
                out.push('\n');

                if self.verbosity == Verbosity::Verbose {
                    let pad = " ".repeat(INDENT.len() + width + GAP);
                    for detail in self.details(entry) {
                        out.push_str(&format!("{pad}{detail}\n"));
                    }
                }
            }
        }

        out.push('\n');
        self.heading(&mut out, "OPTIONS:");
        let width = GLOBAL_OPTIONS
            .iter()
            .map(|(flag, _)| flag.len())
            .max()
            .unwrap_or(0);
        for (flag, description) in GLOBAL_OPTIONS {
            out.push_str(&format!("{INDENT}{flag:<width$}{gap}{description}\n"));
        }

        out
    }

    fn heading(&self, out: &mut String, text: &str) {
        out.push_str(&ansi::bold(text, self.colored));
        out.push('\n');
    }

    fn details(&self, entry: &CommandEntry<'_>) -> Vec<String> {
        let mut lines = Vec::new();
        let aliases = self.aliases_of(entry);
        if !aliases.is_empty() {
            lines.push(ansi::dim(&format!("aliases: {}", aliases.join(", ")), self.colored));
        }
        if let Some(options) = entry.node.options() {
            for example in &options.examples {
                lines.push(ansi::dim(&format!("example: {example}"), self.colored));
            }
        }
        for flag in flag_docs(entry) {
            let mut line = format!("--{} <{}>", flag.name, flag.kind.as_str());
            if flag.required {
                line.push_str(" (required)");
            }
            if let Some(default) = &flag.default {
                line.push_str(&format!(" [default: {}]", display_value(default)));
            }
            if let Some(description) = &flag.description {
                line.push_str("  ");
                line.push_str(description);
            }
            lines.push(line);
        }
        lines
    }

    /// Hidden siblings sharing this command's implementation.
    fn aliases_of(&self, entry: &CommandEntry<'_>) -> Vec<String> {
        let Some(options) = entry.node.options() else {
            return Vec::new();
        };
        let parent = &entry.path[..entry.path.len().saturating_sub(1)];
        options
            .aliases
            .iter()
            .filter(|alias| {
                let mut path = parent.to_vec();
                path.push(alias.as_str());
                self.tree.get(&path).is_some_and(|n| n.is_hidden())
            })
            .cloned()
            .collect()
    }
}

fn flag_docs(entry: &CommandEntry<'_>) -> Vec<FlagDoc> {
    entry
        .node
        .options()
        .and_then(|o| o.validator.as_ref())
        .map(|v| v.fields())
        .unwrap_or_default()
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
