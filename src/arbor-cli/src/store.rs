//! In-memory user store shared through the execution context.

use std::collections::BTreeSet;
use std::sync::Arc;

use arbor_commands::ExecutionContext;
use parking_lot::Mutex;

/// Context store key holding the [`UserStore`].
pub const STORE_KEY: &str = "users";

/// Users known to this run.
#[derive(Debug, Default)]
pub struct UserStore {
    users: Mutex<BTreeSet<String>>,
}

impl UserStore {
    /// Store holding the built-in `admin` and `guest` users.
    pub fn seeded() -> Self {
        let store = Self::default();
        store.add("admin");
        store.add("guest");
        store
    }

    /// Returns false if the user already exists.
    pub fn add(&self, name: &str) -> bool {
        self.users.lock().insert(name.to_string())
    }

    /// Returns false if there was no such user.
    pub fn remove(&self, name: &str) -> bool {
        self.users.lock().remove(name)
    }

    pub fn list(&self) -> Vec<String> {
        self.users.lock().iter().cloned().collect()
    }

    /// The store installed by the before-hook.
    pub fn from_context(ctx: &ExecutionContext) -> anyhow::Result<Arc<UserStore>> {
        ctx.get::<UserStore>(STORE_KEY)
            .ok_or_else(|| anyhow::anyhow!("user store is not initialized"))
    }
}
