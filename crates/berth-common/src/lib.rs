//! # berth-common
//!
//! Shared types, error definitions, runtime spec documents, configuration
//! models, and constants used across the entire Berth workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the foundational primitives that the runtime
//! client and the daemon build upon.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod spec;
pub mod types;
