//! CLI argument parsing module.

mod args;
mod commands;
mod transcript;

pub use args::Cli;
pub use commands::execute;
pub use transcript::{render_summary, render_transcript};
