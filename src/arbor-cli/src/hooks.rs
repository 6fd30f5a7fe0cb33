//! Hooks run around every demo command.

use std::time::Instant;

use arbor_commands::{Dispatcher, hook_fn};
use tracing::debug;

use crate::store::{STORE_KEY, UserStore};

const STARTED_KEY: &str = "started_at";

pub fn install(app: &mut Dispatcher) {
    app.before_each(hook_fn(|ctx| async move {
        ctx.insert(STORE_KEY, UserStore::seeded());
        ctx.insert(STARTED_KEY, Instant::now());
        Ok(())
    }));

    app.after_each(hook_fn(|ctx| async move {
        if let Some(started) = ctx.get::<Instant>(STARTED_KEY) {
            debug!(
                "Command '{}' finished in {:?}",
                ctx.command_name(),
                started.elapsed()
            );
        }
        Ok(())
    }));
}
