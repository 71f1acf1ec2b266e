//! Small helpers shared by the workspace crates: environment access and
//! TOML configuration loading.

pub mod config;
pub mod env;
