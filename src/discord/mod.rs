//! Discord-facing layer: gateway loop, command handlers, embed formatting.

pub mod bot;
pub mod commands;
pub mod format;
