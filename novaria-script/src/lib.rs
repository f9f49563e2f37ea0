#![deny(clippy::unwrap_used)]

pub mod host;
pub mod simrpc;

pub use host::{ScriptHost, ScriptHostDiagnostics, ScriptModuleSource};
