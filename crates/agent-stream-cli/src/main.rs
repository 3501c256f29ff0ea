//! Streams agent responses into the terminal with a typing animation.
//!
//! With `--keywords`/`--prompt` a single query is submitted. Otherwise every
//! stdin line is a query; a line entered while an answer is still typing
//! replaces that answer.

mod query;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use agent_stream::init_logging;
use agent_stream::prelude::*;
use clap::Parser;
use tokio::io::{AsyncBufReadExt as _, BufReader};

use crate::query::compose_query;

#[derive(Parser, Debug)]
#[command(name = "agent-stream", version, about)]
struct Args {
    /// Base URL of the agent service (overrides AGENT_STREAM_URL).
    #[arg(long)]
    url: Option<String>,
    /// Milliseconds per revealed character (overrides AGENT_STREAM_TYPING_MS).
    #[arg(long)]
    typing_ms: Option<u64>,
    /// Keywords for a one-shot query.
    #[arg(long)]
    keywords: Option<String>,
    /// Detailed instructions for a one-shot query.
    #[arg(long)]
    prompt: Option<String>,
    /// Print the session history after a one-shot query.
    #[arg(long)]
    history: bool,
    /// Log filter such as `debug` or `agent_stream=trace` (overrides AGENT_STREAM_LOG).
    #[arg(long)]
    log: Option<String>,
    /// Write JSONL logs to this file instead of stderr (overrides AGENT_STREAM_LOG_FILE).
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut logging = LogConfig::from_env();
    if let Some(filter) = args.log {
        logging = logging.filter(filter);
    }
    if let Some(path) = args.log_file {
        logging = logging.json_file(path);
    }
    init_logging(&logging)?;

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = args.url {
        config = config.base_url(url);
    }
    if let Some(ms) = args.typing_ms {
        config = config.typing_interval(Duration::from_millis(ms));
    }
    let transport = Arc::new(HttpTransport::new(config.clone())?);
    let client = AgentClient::with_transport(config, transport.clone(), TerminalSurface::stdout())?;

    if args.keywords.is_none() && args.prompt.is_none() {
        return interactive(client).await;
    }

    let Some(query) = compose_query(args.keywords.as_deref(), args.prompt.as_deref()) else {
        eprintln!("enter at least keywords or a prompt");
        return Ok(ExitCode::from(2));
    };
    // failures are already rendered in the panel
    let result = client.submit(&query).await;
    if args.history
        && let Some(session) = client.last_session()
    {
        print_history(&transport, &session).await;
    }
    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn interactive(client: AgentClient) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = None;
    while let Some(line) = lines.next_line().await? {
        let query = line.trim().to_string();
        if query.is_empty() {
            continue;
        }
        let client = client.clone();
        // an earlier submission still running is superseded by this one
        in_flight = Some(tokio::spawn(async move {
            if let Err(err) = client.submit(&query).await {
                tracing::debug!(error = %err, "submission failed");
            }
        }));
    }
    if let Some(handle) = in_flight {
        let _ = handle.await;
    }
    Ok(ExitCode::SUCCESS)
}

async fn print_history(transport: &HttpTransport, session: &SessionId) {
    match transport.history(session).await {
        Ok(history) => {
            println!("\n===== Session history ({}) =====", history.session_id);
            for (idx, entry) in history.history.iter().enumerate() {
                println!("{}. {}: {}", idx + 1, role_label(&entry.role), entry.content);
            }
        }
        Err(err) => eprintln!("failed to fetch history: {err}"),
    }
}

fn role_label(role: &str) -> &'static str {
    match role {
        "user" => "User",
        "ai" | "assistant" => "AI",
        _ => "Tool",
    }
}
