//! I/O helpers for reflex commands.

pub mod config;
pub mod context;
pub mod export;
pub mod failure_log;
pub mod git;
pub mod init;
pub mod model;
pub mod patch;
pub mod paths;
pub mod process;
pub mod prompt;
pub mod verify;
pub mod workspace;
