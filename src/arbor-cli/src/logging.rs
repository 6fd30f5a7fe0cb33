//! Log setup for the binary.
//!
//! Logs go to stderr so they never mix with command output. `RUST_LOG` takes
//! a full filter; `ARBOR_LOG_LEVEL` sets one level for the arbor crates.

use tracing_subscriber::EnvFilter;

const ARBOR_TARGETS: &[&str] = &["arbor_cli", "arbor_commands", "arbor_common", "arbor_otel"];

/// Filter directive for the given environment values.
pub fn filter_directive(rust_log: Option<&str>, level: Option<&str>) -> String {
    if let Some(filter) = rust_log.filter(|f| !f.trim().is_empty()) {
        return filter.to_string();
    }
    match level.map(str::trim).filter(|l| !l.is_empty()) {
        Some(level) => {
            let mut directive = String::from("warn");
            for target in ARBOR_TARGETS {
                directive.push_str(&format!(",{target}={level}"));
            }
            directive
        }
        None => "warn".to_string(),
    }
}

/// Install the global subscriber.
pub fn init() {
    let directive = filter_directive(
        std::env::var("RUST_LOG").ok().as_deref(),
        std::env::var("ARBOR_LOG_LEVEL").ok().as_deref(),
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
