//! Transport adapters: where envelopes come from and commands go to.

pub mod ndjson;
pub mod server;

pub use ndjson::EnvelopeReader;
pub use server::{start_server, ServerState};
