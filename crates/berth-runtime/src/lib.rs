//! Runtime client for the Berth daemon.
//!
//! Prepares bundle directories, persists runtime specs, and delegates
//! process creation and signalling to the runtime shim, serializing work
//! per container ID.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod bundle;
pub mod client;
pub mod container;
pub mod error;
pub mod locker;
pub mod notifier;
pub mod options;
pub mod shim;
