use anyhow::Result;
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::info;

use rss_to_md_core::{AppConfig, Converter, McpServer};

/// Serve MCP over stdio until the client disconnects or a signal arrives
pub async fn run(config: &AppConfig) -> Result<()> {
    let converter = Converter::from_config(config)?;
    let server = McpServer::new(converter, config.server.clone());

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Setup signal handlers for graceful shutdown
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    info!("{} running on stdio", config.server.name);

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    server.run(stdin, stdout, shutdown_rx).await?;

    info!("Server stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(_) => {
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    tokio::signal::ctrl_c().await.ok();
}
