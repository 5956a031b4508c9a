//! Stable exit codes for reflex CLI commands.

/// Command succeeded (verification passed, export written, workspace updated).
pub const OK: i32 = 0;
/// Usage error, fatal setup error, or a `develop` run that never went green.
pub const INVALID: i32 = 1;
/// `reflex heal` used every attempt without a passing verification.
pub const EXHAUSTED: i32 = 2;
/// `reflex export` was declined at the overwrite prompt.
pub const CANCELLED: i32 = 3;
