//! `user add|remove|list`, with `list` loaded on first use.

use arbor_commands::{
    CommandError, CommandOptions, ConfigurationError, Dispatcher, ExecutionContext, Flags,
    ImportDescriptor, ModuleExports, SerdeFlags, StaticModules, Verbosity, handler_fn,
};
use serde::{Deserialize, Serialize};

use crate::output;
use crate::store::UserStore;

/// Module source for the lazily loaded user commands.
pub const USERS_MODULE: &str = "users";

#[derive(Debug, Serialize, Deserialize)]
struct AddFlags {
    #[serde(default)]
    admin: bool,
}

/// Resolver for the lazily loaded user commands.
pub fn modules() -> StaticModules {
    StaticModules::new().module(USERS_MODULE, || async {
        Ok(ModuleExports::new().with_handler("list", handler_fn(list)))
    })
}

pub fn register(app: &mut Dispatcher) -> Result<(), ConfigurationError> {
    app.register_command(
        &["user", "add"],
        handler_fn(add),
        CommandOptions::new()
            .description("Add one or more users")
            .example("arbor user add alice bob")
            .validator(SerdeFlags::<AddFlags>::new()),
    )?;
    app.register_command(
        &["user", "remove"],
        handler_fn(remove),
        CommandOptions::new()
            .description("Remove a user")
            .example("arbor user rm guest")
            .alias("rm"),
    )?;
    app.register_lazy_command(
        &["user", "list"],
        ImportDescriptor::new(USERS_MODULE).export("list"),
        CommandOptions::new().description("List users"),
    )
}

async fn add(args: Vec<String>, flags: Flags, ctx: ExecutionContext) -> anyhow::Result<()> {
    if args.is_empty() {
        return Err(CommandError::new(2, "Usage: arbor user add <name>...").into());
    }
    let flags: AddFlags = serde_json::from_value(serde_json::Value::Object(flags))?;
    let store = UserStore::from_context(&ctx)?;

    for name in &args {
        if !store.add(name) {
            return Err(CommandError::new(2, format!("User '{name}' already exists")).into());
        }
        if !ctx.is_quiet() {
            let role = if flags.admin { " as admin" } else { "" };
            println!("Added user '{name}'{role}");
        }
    }
    Ok(())
}

async fn remove(args: Vec<String>, _flags: Flags, ctx: ExecutionContext) -> anyhow::Result<()> {
    let [name] = args.as_slice() else {
        return Err(CommandError::new(2, "Usage: arbor user remove <name>").into());
    };
    if name == "admin" {
        return Err(CommandError::new(3, "Refusing to remove the admin user").into());
    }

    let store = UserStore::from_context(&ctx)?;
    if !store.remove(name) {
        return Err(CommandError::new(2, format!("No such user '{name}'")).into());
    }
    if !ctx.is_quiet() {
        println!("Removed user '{name}'");
    }
    Ok(())
}

async fn list(_args: Vec<String>, _flags: Flags, ctx: ExecutionContext) -> anyhow::Result<()> {
    let users = UserStore::from_context(&ctx)?.list();
    let rendered = output::render(ctx.output, &users, || {
        let mut text = users.join("\n");
        if ctx.verbosity == Verbosity::Verbose {
            text.push_str(&format!("\n({} users)", users.len()));
        }
        text
    })?;
    println!("{rendered}");
    Ok(())
}
