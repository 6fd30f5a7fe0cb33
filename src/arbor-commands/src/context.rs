//! Per-invocation execution context.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arbor_otel::CommandSpan;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::Flags;
use crate::args::{OutputMode, PASSTHROUGH_KEY, Verbosity};

type Store = HashMap<String, Arc<dyn Any + Send + Sync>>;

/// State for one command invocation.
///
/// Clones share the key/value store, the cancellation token and the span,
/// so data a before-hook inserts is visible to the handler.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Positional arguments after the command path.
    pub args: Vec<String>,
    pub flags: Flags,
    pub command_path: Vec<String>,
    pub verbosity: Verbosity,
    pub output: OutputMode,
    store: Arc<Mutex<Store>>,
    cancellation: CancellationToken,
    span: Option<Arc<dyn CommandSpan>>,
}

impl ExecutionContext {
    pub fn new(command_path: Vec<String>, args: Vec<String>, flags: Flags) -> Self {
        Self {
            args,
            flags,
            command_path,
            verbosity: Verbosity::default(),
            output: OutputMode::default(),
            store: Arc::new(Mutex::new(HashMap::new())),
            cancellation: CancellationToken::new(),
            span: None,
        }
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub(crate) fn attach_span(&mut self, span: Arc<dyn CommandSpan>) {
        self.span = Some(span);
    }

    /// Space-joined command path, `root` for the root command.
    pub fn command_name(&self) -> String {
        if self.command_path.is_empty() {
            "root".to_string()
        } else {
            self.command_path.join(" ")
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Store a value for later hooks and the handler.
    pub fn insert<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.store.lock().insert(key.into(), Arc::new(value));
    }

    /// Fetch a stored value; `None` if absent or of another type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.store.lock().get(key).cloned()?;
        value.downcast::<T>().ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.lock().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.store.lock().remove(key).is_some()
    }

    /// Deserialize the flags into `T`.
    pub fn typed_flags<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.flags.clone()))
    }

    /// Tokens given after `--`.
    pub fn passthrough(&self) -> Vec<String> {
        match self.flags.get(PASSTHROUGH_KEY) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once the invocation is interrupted.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

    /// The invocation's span, once started.
    pub fn span(&self) -> Option<&Arc<dyn CommandSpan>> {
        self.span.as_ref()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.store.lock().keys().cloned().collect();
        keys.sort();
        f.debug_struct("ExecutionContext")
            .field("command_path", &self.command_path)
            .field("args", &self.args)
            .field("flags", &self.flags)
            .field("verbosity", &self.verbosity)
            .field("output", &self.output)
            .field("store_keys", &keys)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        let flags = match json!({"name": "bob", "--": ["a", "b"]}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        ExecutionContext::new(
            vec!["user".to_string(), "add".to_string()],
            vec!["extra".to_string()],
            flags,
        )
    }

    #[test]
    fn test_store_shared_between_clones() {
        let ctx = ctx();
        let hook_view = ctx.clone();
        hook_view.insert("started", 42u64);

        assert_eq!(ctx.get::<u64>("started").as_deref(), Some(&42));
        assert!(ctx.get::<String>("started").is_none());
        assert!(ctx.remove("started"));
        assert!(!hook_view.contains("started"));
    }

    #[test]
    fn test_command_name() {
        assert_eq!(ctx().command_name(), "user add");
        let root = ExecutionContext::new(Vec::new(), Vec::new(), Flags::new());
        assert_eq!(root.command_name(), "root");
    }

    #[test]
    fn test_passthrough_and_typed_flags() {
        #[derive(Deserialize)]
        struct Add {
            name: String,
        }

        let ctx = ctx();
        assert_eq!(ctx.passthrough(), vec!["a", "b"]);
        let add: Add = ctx.typed_flags().unwrap();
        assert_eq!(add.name, "bob");
    }

    #[test]
    fn test_cancellation_shared() {
        let token = CancellationToken::new();
        let ctx = ctx().with_cancellation(token.clone());
        let clone = ctx.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
        assert!(clone.is_cancelled());
    }
}
