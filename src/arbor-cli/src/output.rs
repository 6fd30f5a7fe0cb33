//! Rendering command results in the selected output mode.

use arbor_commands::OutputMode;
use serde::Serialize;

/// Serialize `value` as JSON or YAML, or use `text` in text mode.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text: impl FnOnce() -> String,
) -> anyhow::Result<String> {
    Ok(match mode {
        OutputMode::Text => text(),
        OutputMode::Json => serde_json::to_string_pretty(value)?,
        OutputMode::Yaml => serde_yaml::to_string(value)?.trim_end().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_modes() {
        let users = vec!["admin", "guest"];
        let text = || users.join("\n");
        assert_eq!(render(OutputMode::Text, &users, text).unwrap(), "admin\nguest");
        assert_eq!(
            render(OutputMode::Json, &users, String::new).unwrap(),
            "[\n  \"admin\",\n  \"guest\"\n]"
        );
        assert_eq!(
            render(OutputMode::Yaml, &users, String::new).unwrap(),
            "- admin\n- guest"
        );
    }
}
