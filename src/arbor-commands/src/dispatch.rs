//! The dispatch pipeline.
//!
//! [`Dispatcher::run`] takes an argument vector through global flag parsing,
//! configuration, traversal, hooks, lazy loading, validation and the handler,
//! and reports the result as an [`Outcome`]. Nothing in here exits the
//! process; the binary maps the outcome to an exit code once.

use std::sync::{Arc, OnceLock};

use arbor_common::{
    ConfigLoader, EnvLoader, EnvOverrides, YamlConfigLoader, env_prefix, merge_layers,
};
use arbor_otel::{CommandSpan, OtelSettings, Tracer};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::Flags;
use crate::args::{GlobalArgs, OutputMode, PASSTHROUGH_KEY, Verbosity, split_command_args};
use crate::console::{Console, StdConsole};
use crate::context::ExecutionContext;
use crate::error::{CommandError, ConfigurationError, FieldError};
use crate::handler::{CommandHandler, Hook};
use crate::help::HelpRenderer;
use crate::lazy::{ImportDescriptor, ModuleResolver, StaticModules};
use crate::suggest::suggest_from;
use crate::tree::{CommandOptions, CommandTree, NodeKind};

/// Name, version and description of the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
}

impl AppInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The handler and every hook succeeded.
    Completed { command: String },
    VersionShown,
    HelpShown,
    UnknownCommand {
        attempted: String,
        suggestion: Option<String>,
    },
    InvalidFlags {
        command: String,
        errors: Vec<FieldError>,
    },
    /// A hook, the lazy import or the handler failed.
    Failed { exit_code: i32, message: String },
}

impl Outcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Completed { .. } | Outcome::VersionShown | Outcome::HelpShown => 0,
            Outcome::UnknownCommand { .. } | Outcome::InvalidFlags { .. } => 1,
            Outcome::Failed { exit_code, .. } => *exit_code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }
}

/// Machine-readable validation report for `--output json|yaml`.
#[derive(Serialize)]
struct InvalidFlagsReport<'a> {
    error: &'static str,
    command: &'a str,
    errors: &'a [FieldError],
}

/// Builds a tracer from the settings of one run.
pub type TracerBuilder = dyn Fn(&OtelSettings) -> Arc<dyn Tracer> + Send + Sync;

/// Ends the span and flushes its tracer when dropped, so every exit path
/// closes it while the tracer is still alive.
struct SpanGuard {
    span: Arc<dyn CommandSpan>,
    tracer: Arc<dyn Tracer>,
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.span.end();
        self.tracer.flush();
    }
}

/// Stops the interrupt watcher when the run ends.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Command registry plus the pipeline that dispatches into it.
pub struct Dispatcher {
    app: AppInfo,
    tree: CommandTree,
    before: Vec<Arc<dyn Hook>>,
    after: Vec<Arc<dyn Hook>>,
    resolver: Arc<dyn ModuleResolver>,
    config_loader: Arc<dyn ConfigLoader>,
    env_loader: Arc<dyn EnvLoader>,
    tracer: Option<Arc<dyn Tracer>>,
    tracer_builder: Arc<TracerBuilder>,
    default_tracer: OnceLock<Arc<dyn Tracer>>,
    otel: Option<OtelSettings>,
    console: Arc<dyn Console>,
    handle_interrupts: bool,
}

impl Dispatcher {
    pub fn new(app: AppInfo) -> Self {
        Self {
            app,
            tree: CommandTree::new(),
            before: Vec::new(),
            after: Vec::new(),
            resolver: Arc::new(StaticModules::new()),
            config_loader: Arc::new(YamlConfigLoader::new()),
            env_loader: Arc::new(EnvOverrides::new()),
            tracer: None,
            tracer_builder: Arc::new(arbor_otel::build_tracer),
            default_tracer: OnceLock::new(),
            otel: None,
            console: Arc::new(StdConsole),
            handle_interrupts: true,
        }
    }

    pub fn with_resolver(mut self, resolver: impl ModuleResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_config_loader(mut self, loader: impl ConfigLoader + 'static) -> Self {
        self.config_loader = Arc::new(loader);
        self
    }

    pub fn with_env_loader(mut self, loader: impl EnvLoader + 'static) -> Self {
        self.env_loader = Arc::new(loader);
        self
    }

    /// Use `tracer` for every run instead of building one from settings.
    pub fn with_tracer(mut self, tracer: impl Tracer + 'static) -> Self {
        self.tracer = Some(Arc::new(tracer));
        self
    }

    /// Replace how tracers are built from settings.
    ///
    /// Ignored when a fixed tracer is set with [`Dispatcher::with_tracer`].
    pub fn with_tracer_builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(&OtelSettings) -> Arc<dyn Tracer> + Send + Sync + 'static,
    {
        self.tracer_builder = Arc::new(builder);
        self
    }

    /// Settings for the per-run tracer. Defaults to the `OTEL_*` environment.
    pub fn with_otel_settings(mut self, settings: OtelSettings) -> Self {
        self.otel = Some(settings);
        self
    }

    pub fn with_console(mut self, console: impl Console + 'static) -> Self {
        self.console = Arc::new(console);
        self
    }

    /// Cancel the context's token on Ctrl-C. On by default.
    pub fn handle_interrupts(mut self, enabled: bool) -> Self {
        self.handle_interrupts = enabled;
        self
    }

    pub fn app(&self) -> &AppInfo {
        &self.app
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    pub fn register_command(
        &mut self,
        path: &[&str],
        handler: impl CommandHandler + 'static,
        options: CommandOptions,
    ) -> Result<(), ConfigurationError> {
        self.tree.register(path, Arc::new(handler), options)?;
        Ok(())
    }

    pub fn register_lazy_command(
        &mut self,
        path: &[&str],
        descriptor: ImportDescriptor,
        options: CommandOptions,
    ) -> Result<(), ConfigurationError> {
        self.tree.register_lazy(path, descriptor, options)?;
        Ok(())
    }

    /// Run `hook` before every command, after earlier hooks.
    pub fn before_each(&mut self, hook: impl Hook + 'static) {
        self.before.push(Arc::new(hook));
    }

    /// Run `hook` after every successful command, after earlier hooks.
    pub fn after_each(&mut self, hook: impl Hook + 'static) {
        self.after.push(Arc::new(hook));
    }

    /// Dispatch the process arguments.
    pub async fn run_from_env(&self) -> Outcome {
        let argv: Vec<String> = std::env::args_os()
            .skip(1)
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        self.run(&argv).await
    }

    /// Dispatch `argv`, which excludes the program name.
    pub async fn run<S: AsRef<str>>(&self, argv: &[S]) -> Outcome {
        let globals = GlobalArgs::parse(argv);
        let output = globals.output_mode();
        let config = self.load_config(&globals).await;

        if globals.version {
            self.console
                .out(&format!("{} {}", self.app.name, self.app.version));
            return Outcome::VersionShown;
        }

        let verbosity = globals.verbosity();
        let (segments, command_flags) = split_command_args(&globals.rest);

        if globals.help || segments.is_empty() {
            self.print_help(&globals, verbosity, output);
            return Outcome::HelpShown;
        }

        let traversal = self.tree.traverse(&segments);
        let consumed = traversal.consumed;
        let (handler_kind, options) = match (traversal.node.kind(), traversal.node.options()) {
            (NodeKind::Group, _) | (_, None) => {
                return self.unknown_command(&globals, &segments, consumed, verbosity, output);
            }
            (kind, Some(options)) => (kind, options),
        };

        let command_path = segments[..consumed].to_vec();
        let args = segments[consumed..].to_vec();
        let command = command_path.join(" ");

        let mut raw = merge_layers([&config, globals.given_flags(), &command_flags]);
        if let Some(passthrough) = &globals.passthrough {
            raw.insert(
                PASSTHROUGH_KEY.to_string(),
                Value::Array(passthrough.iter().cloned().map(Value::String).collect()),
            );
        }

        let token = CancellationToken::new();
        let _interrupts = self
            .handle_interrupts
            .then(|| watch_interrupt(token.clone()));

        let mut ctx = ExecutionContext::new(command_path, args.clone(), raw.clone())
            .with_verbosity(verbosity)
            .with_output(output)
            .with_cancellation(token);

        info!("Dispatching command '{}'", command);

        for hook in &self.before {
            if let Err(err) = hook.run(&ctx).await {
                debug!("Before-hook failed for '{}'", command);
                return self.fail(err);
            }
        }

        let handler: Arc<dyn CommandHandler> = match handler_kind {
            NodeKind::Handler { handler, .. } => Arc::clone(handler),
            NodeKind::Lazy { entry, .. } => match entry.resolve(self.resolver.as_ref()).await {
                Ok(handler) => handler,
                Err(err) => {
                    warn!("Lazy command '{}' failed to load: {}", command, err);
                    let message = err.to_string();
                    self.console.err(&format!("Error: {message}"));
                    return Outcome::Failed {
                        exit_code: 1,
                        message,
                    };
                }
            },
            NodeKind::Group => {
                return self.unknown_command(&globals, &segments, consumed, verbosity, output);
            }
        };

        let flags = match &options.validator {
            Some(validator) => {
                let unknown = validator.check_given(&command_flags);
                match validator.validate(&raw) {
                    Ok(typed) if unknown.is_empty() => typed,
                    result => {
                        let mut errors = result.err().unwrap_or_default();
                        errors.extend(unknown);
                        self.report_invalid(&command, &errors, output);
                        return Outcome::InvalidFlags { command, errors };
                    }
                }
            }
            None => raw,
        };
        ctx.flags = flags.clone();

        let tracer = self.tracer_for(&globals);
        let span = tracer.start_span(&ctx.command_name());
        span.set_attribute("command.args", &args.len().to_string());
        ctx.attach_span(Arc::clone(&span));
        let guard = SpanGuard {
            span: Arc::clone(&span),
            tracer,
        };

        let result = handler
            .handle(args, flags, ctx.clone())
            .instrument(span.tracing_span())
            .await;
        match result {
            Ok(()) => span.mark_ok(),
            Err(err) => {
                span.mark_failed(&format!("{err:#}"));
                drop(guard);
                return self.fail(err);
            }
        }
        drop(guard);

        for hook in &self.after {
            if let Err(err) = hook.run(&ctx).await {
                debug!("After-hook failed for '{}'", command);
                return self.fail(err);
            }
        }

        debug!("Command '{}' completed", command);
        Outcome::Completed { command }
    }

    async fn load_config(&self, globals: &GlobalArgs) -> Flags {
        let file = self
            .config_loader
            .load(&self.app.name, globals.config.as_deref())
            .await;
        let env = self.env_loader.load(&env_prefix(&self.app.name));
        merge_layers([&file, &env])
    }

    /// Tracer for one run. Without `--trace-endpoint` the tracer is built
    /// once and shared by every run of this dispatcher.
    fn tracer_for(&self, globals: &GlobalArgs) -> Arc<dyn Tracer> {
        if let Some(tracer) = &self.tracer {
            return Arc::clone(tracer);
        }
        match &globals.trace_endpoint {
            Some(endpoint) => {
                let settings = self.otel_settings().with_endpoint(endpoint.clone());
                (self.tracer_builder)(&settings)
            }
            None => Arc::clone(
                self.default_tracer
                    .get_or_init(|| (self.tracer_builder)(&self.otel_settings())),
            ),
        }
    }

    fn otel_settings(&self) -> OtelSettings {
        self.otel.clone().unwrap_or_else(|| {
            let mut settings = OtelSettings::from_env();
            settings.service_version = Some(self.app.version.clone());
            settings
        })
    }

    fn print_help(&self, globals: &GlobalArgs, verbosity: Verbosity, output: OutputMode) {
        let colored = output == OutputMode::Text && globals.color_choice().resolve();
        let help = HelpRenderer::new(&self.app, &self.tree)
            .verbosity(verbosity)
            .colored(colored)
            .render_for(output);
        self.console.out(help.trim_end_matches('\n'));
    }

    fn unknown_command(
        &self,
        globals: &GlobalArgs,
        segments: &[String],
        consumed: usize,
        verbosity: Verbosity,
        output: OutputMode,
    ) -> Outcome {
        let end = (consumed + 1).min(segments.len());
        let attempted = segments[..end].join(" ");
        let suggestion = suggest_from(&self.tree, segments, end);
        debug!(
            "Unknown command '{}' (suggestion: {:?})",
            attempted, suggestion
        );

        self.console.err(&format!("Unknown command: {attempted}"));
        if let Some(suggestion) = &suggestion {
            self.console.err(&format!("Did you mean \"{suggestion}\"?"));
        }
        self.print_help(globals, verbosity, output);

        Outcome::UnknownCommand {
            attempted,
            suggestion,
        }
    }

    fn report_invalid(&self, command: &str, errors: &[FieldError], output: OutputMode) {
        let report = InvalidFlagsReport {
            error: "invalid_flags",
            command,
            errors,
        };
        let structured = match output {
            OutputMode::Text => None,
            OutputMode::Json => serde_json::to_string_pretty(&report).ok(),
            OutputMode::Yaml => serde_yaml::to_string(&report).ok(),
        };

        match structured {
            Some(text) => self.console.err(text.trim_end_matches('\n')),
            None => {
                self.console
                    .err(&format!("Invalid flags for command '{command}':"));
                for error in errors {
                    self.console.err(&format!("  {error}"));
                }
            }
        }
    }

    /// Single mapping point from a hook or handler error to an outcome.
    fn fail(&self, err: anyhow::Error) -> Outcome {
        match err.chain().find_map(|e| e.downcast_ref::<CommandError>()) {
            Some(structured) => {
                self.console.err(&structured.message);
                Outcome::Failed {
                    exit_code: structured.exit_code,
                    message: structured.message.clone(),
                }
            }
            None => {
                let message = format!("{err:#}");
                self.console.err(&format!("Error: {message}"));
                Outcome::Failed {
                    exit_code: 1,
                    message,
                }
            }
        }
    }
}

fn watch_interrupt(token: CancellationToken) -> AbortOnDrop {
    AbortOnDrop(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling command");
            token.cancel();
        }
    }))
}
