//! `greet`: schema-validated flags.

use arbor_commands::{
    CommandOptions, ConfigurationError, Dispatcher, ExecutionContext, FlagField, FlagSchema, Flags,
    handler_fn,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GreetFlags {
    name: String,
    shout: bool,
}

pub fn register(app: &mut Dispatcher) -> Result<(), ConfigurationError> {
    let schema = FlagSchema::new()
        .field(
            FlagField::string("name")
                .default("World")
                .description("Who to greet"),
        )
        .field(
            FlagField::boolean("shout")
                .default(false)
                .description("Print the greeting in capitals"),
        );

    app.register_command(
        &["greet"],
        handler_fn(greet),
        CommandOptions::new()
            .description("Print a greeting")
            .example("arbor greet --name=Alice")
            .validator(schema),
    )
}

async fn greet(_args: Vec<String>, flags: Flags, _ctx: ExecutionContext) -> anyhow::Result<()> {
    let flags: GreetFlags = serde_json::from_value(serde_json::Value::Object(flags))?;
    let greeting = format!("Hello, {}!", flags.name);
    if flags.shout {
        println!("{}", greeting.to_uppercase());
    } else {
        println!("{greeting}");
    }
    Ok(())
}
