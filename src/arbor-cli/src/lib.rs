//! `arbor` demo program: a small command tree wired through
//! [`arbor_commands::Dispatcher`].

use arbor_commands::{AppInfo, ConfigurationError, Dispatcher};

pub mod commands;
pub mod hooks;
pub mod logging;
pub mod output;
pub mod store;

pub const APP_NAME: &str = "arbor";

/// Build the dispatcher with every demo command and hook registered.
pub fn build_app() -> Result<Dispatcher, ConfigurationError> {
    let info = AppInfo::new(APP_NAME, env!("CARGO_PKG_VERSION"))
        .description("Demo command tree built on arbor-commands");
    let mut app = Dispatcher::new(info).with_resolver(commands::user::modules());

    commands::greet::register(&mut app)?;
    commands::user::register(&mut app)?;
    commands::config::register(&mut app)?;
    hooks::install(&mut app);

    Ok(app)
}
