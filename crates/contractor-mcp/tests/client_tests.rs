//! MCP client tests against an in-memory transport

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use contractor_mcp::{ClientInfo, McpClient, McpError, Transport};
use serde_json::{json, Value};

/// Transport that replays canned server messages and records what was sent
#[derive(Default)]
struct ScriptedTransport {
    incoming: VecDeque<Value>,
    sent: Arc<Mutex<Vec<Value>>>,
    closed: bool,
}

impl ScriptedTransport {
    fn new(incoming: Vec<Value>) -> (Self, Arc<Mutex<Vec<Value>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = Self {
            incoming: incoming.into(),
            sent: sent.clone(),
            closed: false,
        };
        (transport, sent)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::other("closed"));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        Ok(self.incoming.pop_front())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

fn client_info() -> ClientInfo {
    ClientInfo {
        name: "contractor".to_string(),
        version: "0.1.0".to_string(),
    }
}

#[tokio::test]
async fn test_initialize_sends_handshake_and_notification() {
    let (transport, sent) = ScriptedTransport::new(vec![json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": {
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {"listChanged": true}},
            "serverInfo": {"name": "docs-server", "version": "1.2.0"}
        }
    })]);

    let mut client = McpClient::new(transport);
    let info = client.initialize(client_info()).await.unwrap();

    assert_eq!(info.name, "docs-server");
    assert_eq!(info.version, "1.2.0");
    assert!(client.server_capabilities().unwrap().tools.as_ref().unwrap().list_changed);

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["method"], "initialize");
    assert_eq!(sent[0]["params"]["clientInfo"]["name"], "contractor");
    assert_eq!(sent[1]["method"], "notifications/initialized");
    assert!(sent[1].get("id").is_none());
}

#[tokio::test]
async fn test_list_tools_skips_notifications() {
    let (transport, _sent) = ScriptedTransport::new(vec![
        json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {"level": "info"}}),
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"tools": [
                {"name": "search_docs", "description": "Search docs", "inputSchema": {"type": "object"}},
                {"name": "bare"}
            ]}
        }),
    ]);

    let client = McpClient::new(transport);
    let tools = client.list_tools().await.unwrap();

    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0].name, "search_docs");
    assert_eq!(tools[0].description.as_deref(), Some("Search docs"));
    assert!(tools[1].description.is_none());
    assert!(tools[1].input_schema.is_none());
}

#[tokio::test]
async fn test_call_tool_joins_text_content() {
    let (transport, sent) = ScriptedTransport::new(vec![json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": {
            "isError": false,
            "content": [
                {"type": "text", "text": "first"},
                {"type": "image"},
                {"type": "text", "text": "second"}
            ]
        }
    })]);

    let client = McpClient::new(transport);
    let result = client.call_tool("search_docs", json!({"q": "rust"})).await.unwrap();

    assert!(!result.is_error);
    assert_eq!(result.joined_text(), "first\nsecond");
    assert_eq!(sent.lock().unwrap()[0]["params"]["arguments"]["q"], "rust");
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let (transport, _sent) = ScriptedTransport::new(vec![json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": {"code": -32602, "message": "Unknown tool"}
    })]);

    let client = McpClient::new(transport);
    let err = client.call_tool("nope", json!({})).await.unwrap_err();

    assert!(matches!(err, McpError::Server(ref msg) if msg == "Unknown tool"));
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_closed_stream_marks_client_disconnected() {
    let (transport, _sent) = ScriptedTransport::new(vec![]);

    let client = McpClient::new(transport);
    let err = client.list_tools().await.unwrap_err();

    assert!(matches!(err, McpError::Transport(_)));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_close_rejects_further_requests() {
    let (transport, sent) = ScriptedTransport::new(vec![]);

    let client = McpClient::new(transport);
    client.close().await.unwrap();

    assert!(!client.is_connected());
    assert!(matches!(client.list_tools().await, Err(McpError::Transport(_))));
    assert!(sent.lock().unwrap().is_empty());
}
