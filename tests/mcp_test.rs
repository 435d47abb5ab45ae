mod common;

use ckan_explorer::config::ClientConfig;
use ckan_explorer::dispatch::server::CatalogServer;
use ckan_explorer::query::Action;
use ckan_explorer::{Command, Dispatcher};
use common::ScriptedTransport;
use rmcp::ServiceExt;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};

struct Session {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl Session {
    /// Server on one end of an in-memory pipe, raw JSON-RPC on the other
    fn start() -> Self {
        let (_, client) = ScriptedTransport::new()
            .success(
                Action::StatusShow,
                json!({"ckan_version": "2.10.4", "site_title": "Demo"}),
            )
            .into_client();
        let server = CatalogServer::new(
            Dispatcher::new(client),
            ClientConfig::new("https://data.example.org"),
        );

        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(theirs);
        tokio::spawn(async move {
            if let Ok(running) = server.serve((server_read, server_write)).await {
                let _ = running.waiting().await;
            }
        });

        let (read, writer) = tokio::io::split(ours);
        Self {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    async fn send(&mut self, message: Value) {
        let mut line = message.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Next message carrying `id`, skipping notifications
    async fn reply(&mut self, id: i64) -> Value {
        let wait = async {
            loop {
                let line = self.lines.next_line().await.unwrap().expect("server closed the pipe");
                let message: Value = serde_json::from_str(&line).unwrap();
                if message["id"] == id {
                    return message;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("no reply within 5s")
    }

    async fn initialize(&mut self) -> Value {
        self.send(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-host", "version": "0.0.1"}
            }
        }))
        .await;
        let reply = self.reply(1).await;
        self.send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
        reply
    }
}

#[tokio::test]
async fn test_handshake_then_list_and_call_tools() {
    common::init_test_logging();
    let mut session = Session::start();

    let init = session.initialize().await;
    assert_eq!(init["jsonrpc"], "2.0");
    assert!(init["result"]["capabilities"]["tools"].is_object());
    assert!(init["result"]["capabilities"]["resources"].is_object());
    assert_eq!(init["result"]["serverInfo"]["name"], "ckan-explorer");

    session
        .send(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list", "params": {}}))
        .await;
    let listed = session.reply(2).await;
    let tools = listed["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), Command::ALL.len());
    assert!(tools
        .iter()
        .all(|t| t["name"].as_str().unwrap().starts_with("ckan_")));
    assert!(tools.iter().any(|t| t["name"] == "ckan_resource_preview"));

    session
        .send(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "ckan_status_show", "arguments": {}}
        }))
        .await;
    let called = session.reply(3).await;
    assert_ne!(called["result"]["isError"], true);
    let text = called["result"]["content"][0]["text"].as_str().unwrap();
    let body: Value = serde_json::from_str(text).unwrap();
    assert_eq!(body["data"]["ckan_version"], "2.10.4");
}

#[tokio::test]
async fn test_tool_failures_and_unknown_tools() {
    let mut session = Session::start();
    session.initialize().await;

    session
        .send(json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": {"name": "ckan_package_show", "arguments": {"id": " "}}
        }))
        .await;
    let failed = session.reply(4).await;
    assert_eq!(failed["result"]["isError"], true);
    let body: Value =
        serde_json::from_str(failed["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(body["error"]["kind"], "validation");

    session
        .send(json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": {"name": "ckan_package_delete", "arguments": {}}
        }))
        .await;
    let unknown = session.reply(5).await;
    assert!(unknown["error"].is_object());
    assert!(unknown.get("result").is_none());
}

#[tokio::test]
async fn test_documentation_resources() {
    let mut session = Session::start();
    session.initialize().await;

    session
        .send(json!({"jsonrpc": "2.0", "id": 6, "method": "resources/list", "params": {}}))
        .await;
    let listed = session.reply(6).await;
    let uris: Vec<&str> = listed["result"]["resources"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["uri"].as_str())
        .collect();
    assert_eq!(
        uris,
        vec!["ckan://api/docs", "ckan://config", "ckan://enhanced/features"]
    );

    session
        .send(json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "resources/read",
            "params": {"uri": "ckan://config"}
        }))
        .await;
    let read = session.reply(7).await;
    let config: Value =
        serde_json::from_str(read["result"]["contents"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(config["base_url"], "https://data.example.org");
}
