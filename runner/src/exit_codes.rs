//! Stable exit codes for the `hrd` CLI.

/// Analysis completed (or `--dry-run` printed the request).
pub const OK: i32 = 0;
/// The analysis failed, or configuration could not be loaded.
pub const FAILED: i32 = 1;
/// Missing or invalid command-line arguments (reported by clap).
pub const USAGE: i32 = 2;
