//! CLI command implementations
//!
//! Each submodule implements one subcommand.

pub mod exposure;
pub mod simm;
pub mod var;
