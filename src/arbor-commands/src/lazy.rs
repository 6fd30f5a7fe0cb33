//! Deferred loading of command implementations.
//!
//! A lazy command is registered with an [`ImportDescriptor`] naming a module
//! source and an export. The first dispatch imports the module through a
//! [`ModuleResolver`] and caches the handler in the node's [`LazyHandler`];
//! later dispatches reuse it without importing again.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::LoadError;
use crate::handler::CommandHandler;

/// Export name used when a descriptor does not name one.
pub const DEFAULT_EXPORT: &str = "default";

/// Where to find a lazily loaded handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDescriptor {
    pub source: String,
    pub export_name: String,
}

impl ImportDescriptor {
    /// Descriptor for the default export of `source`.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            export_name: DEFAULT_EXPORT.to_string(),
        }
    }

    /// Use a named export instead of the default one.
    pub fn export(mut self, name: impl Into<String>) -> Self {
        self.export_name = name.into();
        self
    }
}

/// A single export of a loaded module.
#[derive(Clone)]
pub enum Export {
    Handler(Arc<dyn CommandHandler>),
    /// Anything that is not callable.
    Value(serde_json::Value),
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Export::Handler(_) => f.write_str("Export::Handler(..)"),
            Export::Value(v) => f.debug_tuple("Export::Value").field(v).finish(),
        }
    }
}

/// Export table of a loaded module.
#[derive(Debug, Clone, Default)]
pub struct ModuleExports {
    exports: HashMap<String, Export>,
}

impl ModuleExports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named handler export.
    pub fn with_handler(
        mut self,
        name: impl Into<String>,
        handler: impl CommandHandler + 'static,
    ) -> Self {
        self.exports.insert(name.into(), Export::Handler(Arc::new(handler)));
        self
    }

    /// Add the default handler export.
    pub fn with_default(self, handler: impl CommandHandler + 'static) -> Self {
        self.with_handler(DEFAULT_EXPORT, handler)
    }

    /// Add a non-callable export.
    pub fn with_value(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.exports.insert(name.into(), Export::Value(value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Export> {
        self.exports.get(name)
    }
}

/// Performs the deferred import of a module source.
#[async_trait]
pub trait ModuleResolver: Send + Sync {
    async fn import(&self, source: &str) -> anyhow::Result<ModuleExports>;
}

/// Factory producing a module's exports on demand.
pub type ModuleFactory =
    Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<ModuleExports>> + Send + Sync>;

/// Resolver backed by a table of module factories.
///
/// Factories run only when a command from their module is first dispatched,
/// so expensive setup stays off the startup path.
#[derive(Clone, Default)]
pub struct StaticModules {
    factories: HashMap<String, ModuleFactory>,
}

impl StaticModules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for `source`.
    pub fn module<F, Fut>(mut self, source: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ModuleExports>> + Send + 'static,
    {
        self.factories
            .insert(source.into(), Arc::new(move || factory().boxed()));
        self
    }

    pub fn contains(&self, source: &str) -> bool {
        self.factories.contains_key(source)
    }
}

impl fmt::Debug for StaticModules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sources: Vec<&String> = self.factories.keys().collect();
        sources.sort();
        f.debug_struct("StaticModules")
            .field("sources", &sources)
            .finish()
    }
}

#[async_trait]
impl ModuleResolver for StaticModules {
    async fn import(&self, source: &str) -> anyhow::Result<ModuleExports> {
        let factory = self
            .factories
            .get(source)
            .ok_or_else(|| anyhow::anyhow!("no module registered for '{source}'"))?;
        factory().await
    }
}

/// Resolve-once cell for a lazily registered command.
///
/// Shared between a command and its aliases. Concurrent dispatchers wait on
/// the same initialization; a failed import is not cached.
pub struct LazyHandler {
    descriptor: ImportDescriptor,
    resolved: OnceCell<Arc<dyn CommandHandler>>,
}

impl LazyHandler {
    pub fn new(descriptor: ImportDescriptor) -> Self {
        Self {
            descriptor,
            resolved: OnceCell::new(),
        }
    }

    pub fn descriptor(&self) -> &ImportDescriptor {
        &self.descriptor
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.initialized()
    }

    /// The cached handler, once resolved.
    pub fn get(&self) -> Option<Arc<dyn CommandHandler>> {
        self.resolved.get().cloned()
    }

    /// Import and cache the handler, or return the cached one.
    pub async fn resolve(
        &self,
        resolver: &dyn ModuleResolver,
    ) -> Result<Arc<dyn CommandHandler>, LoadError> {
        let handler = self
            .resolved
            .get_or_try_init(|| async {
                let source = &self.descriptor.source;
                let export = &self.descriptor.export_name;
                debug!("Importing command module '{}' (export '{}')", source, export);

                let module = resolver
                    .import(source)
                    .await
                    .map_err(|e| LoadError::Import {
                        source_name: source.clone(),
                        message: format!("{e:#}"),
                    })?;

                match module.get(export) {
                    Some(Export::Handler(handler)) => Ok(Arc::clone(handler)),
                    Some(Export::Value(_)) => Err(LoadError::NotCallable {
                        source_name: source.clone(),
                        export: export.clone(),
                    }),
                    None => Err(LoadError::MissingExport {
                        source_name: source.clone(),
                        export: export.clone(),
                    }),
                }
            })
            .await?;
        Ok(Arc::clone(handler))
    }
}

impl fmt::Debug for LazyHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyHandler")
            .field("descriptor", &self.descriptor)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop() -> impl CommandHandler {
        handler_fn(|_args, _flags, _ctx| async { Ok(()) })
    }

    #[tokio::test]
    async fn test_resolve_once() {
        let imports = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&imports);
        let modules = StaticModules::new().module("users", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(ModuleExports::new().with_default(noop())) }
        });

        let lazy = LazyHandler::new(ImportDescriptor::new("users"));
        assert!(!lazy.is_resolved());

        let first = lazy.resolve(&modules).await.unwrap();
        let second = lazy.resolve(&modules).await.unwrap();

        assert!(lazy.is_resolved());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(imports.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_named_export() {
        let modules = StaticModules::new().module("users", || async {
            Ok(ModuleExports::new().with_handler("list", noop()))
        });

        let lazy = LazyHandler::new(ImportDescriptor::new("users").export("list"));
        assert!(lazy.resolve(&modules).await.is_ok());

        let lazy = LazyHandler::new(ImportDescriptor::new("users"));
        assert_eq!(
            lazy.resolve(&modules).await.err(),
            Some(LoadError::MissingExport {
                source_name: "users".to_string(),
                export: "default".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_not_callable() {
        let modules = StaticModules::new().module("meta", || async {
            Ok(ModuleExports::new().with_value("default", serde_json::json!({"version": 1})))
        });

        let lazy = LazyHandler::new(ImportDescriptor::new("meta"));
        let err = lazy.resolve(&modules).await.err().unwrap();
        assert!(matches!(err, LoadError::NotCallable { .. }));
        assert!(!lazy.is_resolved());
    }

    #[tokio::test]
    async fn test_failed_import_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let modules = StaticModules::new().module("flaky", move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    anyhow::bail!("connection reset");
                }
                Ok(ModuleExports::new().with_default(noop()))
            }
        });

        let lazy = LazyHandler::new(ImportDescriptor::new("flaky"));
        let err = lazy.resolve(&modules).await.err().unwrap();
        assert!(err.to_string().contains("connection reset"));
        assert!(lazy.resolve(&modules).await.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_source() {
        let lazy = LazyHandler::new(ImportDescriptor::new("missing"));
        let err = lazy.resolve(&StaticModules::new()).await.err().unwrap();
        assert!(matches!(err, LoadError::Import { .. }));
    }
}
