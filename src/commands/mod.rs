//! IPC command handlers, one module per frontend area.

pub mod records;
pub mod reports;
pub mod runtime;
pub mod session;
pub mod settings;
