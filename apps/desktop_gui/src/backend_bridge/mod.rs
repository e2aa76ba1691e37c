//! Worker thread that owns the async runtime and the application core.

pub mod commands;
pub mod runtime;
