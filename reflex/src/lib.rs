//! Self-healing development loop.
//!
//! The engine runs a verification command against a project, feeds failures
//! to a language model together with guideline documents, writes the model's
//! replacement file back, and repeats up to a fixed bound. A meta step mines
//! the failure log for the most frequent error and asks the model to rewrite
//! a guideline so later runs avoid it.
//!
//! - **[`core`]**: Pure, deterministic logic (fence parsing, error tallies,
//!   loop outcomes). No I/O.
//! - **[`io`]**: Side-effecting adapters (config, processes, verification,
//!   failure log, model clients, prompts, git, workspace export).
//!
//! Orchestration modules ([`heal`], [`improve`], [`develop`]) coordinate core
//! logic with I/O to implement CLI commands.

pub mod core;
pub mod develop;
pub mod exit_codes;
pub mod heal;
pub mod improve;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
