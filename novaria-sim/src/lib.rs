#![deny(clippy::unwrap_used)]

pub mod ecs;
pub mod kernel;
pub mod motion;
pub mod ruleset;
pub mod transport;

pub use kernel::{AuthorityMode, Kernel, KernelDiagnostics};
