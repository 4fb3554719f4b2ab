//! CLI command implementations.

pub mod common;
pub mod endpoints;
pub mod resolve;
pub mod run;
pub mod version;
