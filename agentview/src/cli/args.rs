//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Agentview - fold and watch live agent session streams
#[derive(Parser, Debug)]
#[command(name = "agentview")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to $AGENTVIEW_CONFIG, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fold an NDJSON envelope stream and print the transcript
    Replay {
        /// Envelope file, or - for stdin
        #[arg(default_value = "-")]
        source: String,

        /// Print the state summary as JSON instead of a transcript
        #[arg(long)]
        json: bool,

        /// Hide thinking blocks
        #[arg(long)]
        no_thinking: bool,

        /// Show every tool call, even in completed runs
        #[arg(long)]
        expand_tools: bool,
    },

    /// Host a live session runtime over HTTP and WebSocket
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Open browser automatically
        #[arg(long)]
        open: bool,
    },

    /// Post an NDJSON envelope file to a running server
    Push {
        /// Envelope file, or - for stdin
        source: String,

        /// Switch the server to this session before ingesting
        #[arg(short, long)]
        session: Option<String>,

        /// Server port (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
}
