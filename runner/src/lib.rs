//! Command-line driver for HRProfiler homologous recombination deficiency
//! (HRD) analysis.
//!
//! The crate resolves run parameters, prints a parameter summary and hands a
//! single request to the Python `HRProfiler` package. The architecture keeps a
//! strict separation:
//!
//! - **[`core`]**: Pure logic (parameter model, request construction, console
//!   text). No process or filesystem access.
//! - **[`io`]**: Side-effecting operations (config file, child processes, the
//!   analysis backend).
//!
//! [`driver`] ties the two together for the `hrd` binary.

pub mod core;
pub mod driver;
pub mod exit_codes;
pub mod io;
pub mod logging;
