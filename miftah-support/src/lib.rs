//! # Miftah Support
//!
//! Shared utilities for the Miftah DI engine.
//!
//! This crate provides:
//! - Text rendering for resolution-path diagnostics
//! - Common helpers shared between miftah crates

pub mod rendering;
