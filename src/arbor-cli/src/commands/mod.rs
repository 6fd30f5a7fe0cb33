//! Demo commands.

pub mod config;
pub mod greet;
pub mod user;
