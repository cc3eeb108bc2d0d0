//! Agentview - a client runtime for live agent sessions.
//!
//! Folds a stream of producer envelopes (messages, tool calls, permission
//! and question interrupts, lifecycle changes) into one consistent state,
//! groups the message log for display, and drives a virtualized render
//! window that stays pinned to the newest content while it streams.
//!
//! Architecture:
//! - `envelope` classifies raw JSON into typed actions
//! - `state` reduces actions through an ordered list of slices
//! - `grouping` and `render` derive what is shown from the message log
//! - `runtime` owns all of it and turns user intents into outbound commands
//! - `transport` feeds the runtime from NDJSON files or an HTTP/WebSocket host

pub mod cli;
pub mod config;
pub mod envelope;
pub mod error;
pub mod grouping;
pub mod interrupt;
pub mod models;
pub mod render;
pub mod runtime;
pub mod state;
pub mod transport;

pub use runtime::{SessionRuntime, StateSummary};
