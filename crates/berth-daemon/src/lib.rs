//! Daemon-side container lifecycle for Berth.
//!
//! Owns the container registry and drives a start from request
//! validation through mounts, networking, and the runtime client, rolling
//! everything back when a step fails.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod classify;
pub mod cleanup;
pub mod collaborators;
pub mod container;
pub mod daemon;
pub mod exec;
pub mod logging;
pub mod metrics;
pub mod restart;
pub mod settings;
pub mod start;
pub mod state;
pub mod store;
