//! Deterministic, pure logic for the HRD driver.
//!
//! Core modules must be free of process or filesystem side effects. They build
//! the analysis request and render console text for tests to inspect.

pub mod params;
pub mod report;
