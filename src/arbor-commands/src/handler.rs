//! Command handler and hook traits, with closure adapters.

use std::future::Future;

use async_trait::async_trait;

use crate::Flags;
use crate::context::ExecutionContext;

/// Implementation of a command.
///
/// Errors are `anyhow` errors; return a [`crate::CommandError`] to choose the
/// exit code, anything else exits with 1.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        args: Vec<String>,
        flags: Flags,
        ctx: ExecutionContext,
    ) -> anyhow::Result<()>;
}

/// [`CommandHandler`] wrapping an async closure.
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(Vec<String>, Flags, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(
        &self,
        args: Vec<String>,
        flags: Flags,
        ctx: ExecutionContext,
    ) -> anyhow::Result<()> {
        (self.f)(args, flags, ctx).await
    }
}

/// Build a handler from an async closure.
///
/// ```rust,ignore
/// dispatcher.register_command(
///     &["greet"],
///     handler_fn(|_args, flags, _ctx| async move {
///         println!("Hello, {}!", flags["name"]);
///         Ok(())
///     }),
///     CommandOptions::new(),
/// )?;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Vec<String>, Flags, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnHandler { f }
}

/// Middleware run before or after every command invocation.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn run(&self, ctx: &ExecutionContext) -> anyhow::Result<()>;
}

/// [`Hook`] wrapping an async closure. The closure receives a context clone
/// that shares the key/value store with the invocation.
pub struct FnHook<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Hook for FnHook<F>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, ctx: &ExecutionContext) -> anyhow::Result<()> {
        (self.f)(ctx.clone()).await
    }
}

/// Build a hook from an async closure.
pub fn hook_fn<F, Fut>(f: F) -> FnHook<F>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnHook { f }
}
