//! `config show`: print the merged configuration.

use arbor_commands::{
    CommandOptions, ConfigurationError, Dispatcher, ExecutionContext, Flags, PASSTHROUGH_KEY,
    handler_fn,
};
use serde_json::Value;

use crate::output;

pub fn register(app: &mut Dispatcher) -> Result<(), ConfigurationError> {
    app.register_command(
        &["config", "show"],
        handler_fn(show),
        CommandOptions::new()
            .description("Print the merged configuration")
            .example("ARBOR_REGION=eu arbor --output=yaml config show"),
    )
}

async fn show(_args: Vec<String>, flags: Flags, ctx: ExecutionContext) -> anyhow::Result<()> {
    let mut settings = flags;
    settings.remove(PASSTHROUGH_KEY);

    let rendered = output::render(ctx.output, &settings, || {
        settings
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{key} = {s}"),
                other => format!("{key} = {other}"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    })?;
    if !rendered.is_empty() {
        println!("{rendered}");
    }
    Ok(())
}
