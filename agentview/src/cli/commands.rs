//! CLI command execution.

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::config::{self, Config};
use crate::runtime::SessionRuntime;
use crate::state::SettingsPatch;
use crate::transport::server::IngestResponse;
use crate::transport::{start_server, EnvelopeReader};

use super::args::{Cli, Commands};
use super::transcript::{render_summary, render_transcript};

/// Execute the CLI command.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Replay {
            source,
            json,
            no_thinking,
            expand_tools,
        } => {
            let mut display = config.display.as_patch();
            if no_thinking {
                display.show_thinking = Some(false);
            }
            if expand_tools {
                display.collapse_completed_tools = Some(false);
            }
            replay(&config, &source, display, json).await
        }
        Commands::Serve { port, open } => serve(config, port, open).await,
        Commands::Push {
            source,
            session,
            port,
        } => push(&config, &source, session.as_deref(), port).await,
    }
}

async fn replay(config: &Config, source: &str, display: SettingsPatch, json: bool) -> Result<()> {
    let mut reader = EnvelopeReader::open(source).await?;
    let mut runtime = SessionRuntime::new(config.window);
    runtime.update_settings(display);

    let mut total = 0usize;
    let mut ignored = 0usize;
    while let Some(envelope) = reader.next_envelope().await? {
        total += 1;
        if !runtime.ingest(&envelope) {
            ignored += 1;
        }
    }
    tracing::info!(
        total,
        ignored,
        unparsable = reader.skipped(),
        "replay finished"
    );

    if json {
        let summary = serde_json::to_string_pretty(&runtime.summary())
            .context("Failed to serialize summary")?;
        println!("{summary}");
        return Ok(());
    }

    let transcript = render_transcript(&runtime);
    if transcript.is_empty() {
        println!("No messages.");
    } else {
        print!("{transcript}");
    }
    println!("{}", "-".repeat(60));
    print!("{}", render_summary(&runtime.summary()));
    Ok(())
}

async fn serve(mut config: Config, port: Option<u16>, open: bool) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    start_server(&config, open).await
}

async fn push(config: &Config, source: &str, session: Option<&str>, port: Option<u16>) -> Result<()> {
    let envelopes: Vec<Value> = EnvelopeReader::open(source).await?.read_all().await?;
    if envelopes.is_empty() {
        println!("No envelopes in {source}.");
        return Ok(());
    }

    let port = port.unwrap_or(config.server.port);
    let mut url = format!("http://{}:{port}/api/envelopes", config.server.host);
    if let Some(session) = session {
        url = format!("{url}?session={}", urlencoding::encode(session));
    }

    let resp = reqwest::Client::new()
        .post(&url)
        .json(&envelopes)
        .send()
        .await
        .context("Failed to send envelopes to server")?;

    if !resp.status().is_success() {
        bail!("Server returned {}", resp.status());
    }

    let result: IngestResponse = resp.json().await.context("Failed to parse server response")?;
    println!(
        "Pushed {} envelope(s): {} accepted, {} ignored",
        envelopes.len(),
        result.accepted,
        result.ignored
    );
    Ok(())
}
