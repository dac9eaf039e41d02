//! Command-line front end for funchost.

pub mod commands;
pub mod handlers;
pub mod parser;

pub use commands::{Commands, StartArgs};
pub use parser::Cli;
