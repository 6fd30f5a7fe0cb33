//! Hierarchical command dispatch for command-line programs.
//!
//! Commands live in a tree keyed by path segments (`user add`,
//! `cluster node list`). A [`Dispatcher`] owns the tree and runs each
//! invocation through one fixed pipeline:
//!
//! 1. global flags (`--help`, `--version`, `--quiet`, `--verbose`, `--color`,
//!    `--output`, `--config`, `--trace-endpoint`), parsed stop-early
//! 2. configuration from the YAML file and `<APP>_*` environment variables
//! 3. longest-prefix traversal, with a "did you mean" suggestion on a miss
//! 4. before-hooks, lazy handler import, flag validation
//! 5. the handler, inside a tracing span
//! 6. error to exit code mapping, then after-hooks
//!
//! ```rust,ignore
//! use arbor_commands::{AppInfo, CommandOptions, Dispatcher, handler_fn};
//!
//! let mut app = Dispatcher::new(AppInfo::new("demo", env!("CARGO_PKG_VERSION")));
//! app.register_command(
//!     &["user", "add"],
//!     handler_fn(|args, _flags, _ctx| async move {
//!         println!("adding {}", args.join(" "));
//!         Ok(())
//!     }),
//!     CommandOptions::new().description("Add a user"),
//! )?;
//! std::process::exit(app.run_from_env().await.exit_code());
//! ```

pub mod args;
pub mod console;
pub mod context;
pub mod dispatch;
pub mod distance;
pub mod error;
pub mod handler;
pub mod help;
pub mod lazy;
pub mod suggest;
pub mod tree;
pub mod validate;

/// Flag map handed to validators and handlers.
pub type Flags = arbor_common::ConfigMap;

pub use args::{GlobalArgs, OutputMode, PASSTHROUGH_KEY, Verbosity, split_command_args};
pub use console::{BufferConsole, Console, StdConsole};
pub use context::ExecutionContext;
pub use dispatch::{AppInfo, Dispatcher, Outcome, TracerBuilder};
pub use distance::{distance, normalized_distance};
pub use error::{CommandError, ConfigurationError, FieldError, LoadError};
pub use handler::{CommandHandler, FnHandler, FnHook, Hook, handler_fn, hook_fn};
pub use help::{HelpDocument, HelpRenderer};
pub use lazy::{
    DEFAULT_EXPORT, Export, ImportDescriptor, LazyHandler, ModuleExports, ModuleResolver,
    StaticModules,
};
pub use suggest::{SUGGESTION_THRESHOLD, suggest, suggest_from};
pub use tree::{CommandEntry, CommandNode, CommandOptions, CommandTree, NodeId, NodeKind, Traversal};
pub use validate::{FlagDoc, FlagField, FlagKind, FlagSchema, FlagsValidator, SerdeFlags};
