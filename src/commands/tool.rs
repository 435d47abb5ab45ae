use anyhow::{Context, Result};
use rmcp::ServiceExt;

use ckan_explorer::config::ClientConfig;
use ckan_explorer::dispatch::server::CatalogServer;
use ckan_explorer::{CatalogClient, Dispatcher};

/// Print every tool description as pretty JSON
pub fn list() -> Result<()> {
    let tools = serde_json::to_string_pretty(&Dispatcher::tools())?;
    println!("{}", tools);
    Ok(())
}

/// MCP over stdin/stdout until the host closes the pipe
pub async fn serve(client: CatalogClient, config: ClientConfig) -> Result<()> {
    tracing::info!(portal = %config.base_url, "serving MCP on stdio");
    let server = CatalogServer::new(Dispatcher::new(client), config);
    let running = server
        .serve(rmcp::transport::stdio())
        .await
        .context("MCP handshake failed")?;
    let reason = running.waiting().await.context("MCP server stopped")?;
    tracing::info!(?reason, "MCP session ended");
    Ok(())
}

/// One call; exits non-zero when the tool reports failure
pub async fn invoke(client: CatalogClient, name: &str, arguments: &str) -> Result<()> {
    let arguments: serde_json::Value =
        serde_json::from_str(arguments).context("Arguments must be a JSON object")?;
    let response = Dispatcher::new(client).invoke(name, arguments).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.success {
        anyhow::bail!("Tool '{}' failed", name);
    }
    Ok(())
}
