//! Command handlers.

pub mod ports;
pub mod project;
pub mod start;
pub mod which;
