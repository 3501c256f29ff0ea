use agent_stream::init_logging;
use agent_stream::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    init_logging(&LogConfig::from_env())?;
    let client = AgentClient::new(ClientConfig::from_env()?, TerminalSurface::stdout())?;

    client.submit("What's the weather like today?").await?;

    if let Some(session) = client.last_session() {
        let transport = HttpTransport::new(client.config().clone())?;
        match transport.history(&session).await {
            Ok(history) => {
                for (idx, entry) in history.history.iter().enumerate() {
                    println!("{}. {}: {}", idx + 1, entry.role, entry.content);
                }
            }
            Err(err) => eprintln!("history unavailable: {err}"),
        }
    }
    Ok(())
}
