//! CLI command implementations.

pub mod common;
pub mod probe;
pub mod resolve;
pub mod targets;
pub mod version;
