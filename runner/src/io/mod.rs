//! I/O helpers for the HRD driver.

pub mod analysis;
pub mod config;
pub mod process;
