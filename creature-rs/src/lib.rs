//! creature-rs library
//!
//! Command definitions and terminal helpers behind the `creature-rs` binary.

pub mod cli;
pub mod commands;
pub mod utils;
