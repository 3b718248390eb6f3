//! Shortforge - automated vertical shorts with multi-provider fallback
//!
//! This library crate exposes configuration, the concrete providers and the
//! pipeline factory to the binary and to integration tests.

pub mod config;
pub mod providers;
pub mod publishers;
pub mod registry;
