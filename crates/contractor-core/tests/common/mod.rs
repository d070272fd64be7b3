//! Shared fakes for integration tests: a scripted model provider and
//! in-memory tool backends.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use contractor_core::config::BackendConfig;
use contractor_core::mcp_manager::{BackendClient, BackendConnectionManager, BackendConnector};
use contractor_core::provider::{
    CompletionRequest, CompletionResult, ModelProvider, ToolCallRequest,
};
use contractor_core::{Error, Result};
use contractor_mcp::{ContentItem, McpError, McpTool, ToolCallResult};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Provider that replays queued replies and records every request
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<CompletionResult>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<CompletionResult>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResult> {
        self.requests.lock().push(request);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Provider("no scripted reply left".into())))
    }
}

pub fn provider_error(message: &str) -> Result<CompletionResult> {
    Err(Error::Provider(message.to_string()))
}

pub fn call(id: &str, name: &str, args: Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, args.to_string())
}

pub fn mcp_tool(name: &str, description: &str) -> McpTool {
    McpTool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: Some(json!({
            "type": "object",
            "properties": { "input": { "type": "string", "description": "Input" } },
            "required": ["input"]
        })),
    }
}

/// In-memory backend. Tool calls answer with `"<backend>:<tool>"` unless
/// a reply is set for the tool.
pub struct FakeBackend {
    pub name: String,
    tools: Mutex<Vec<McpTool>>,
    replies: Mutex<HashMap<String, ToolCallResult>>,
    fail_listing: AtomicBool,
    connected: AtomicBool,
    pub list_calls: AtomicUsize,
    pub calls: Mutex<Vec<(String, Value)>>,
    pub closed: AtomicBool,
}

impl FakeBackend {
    pub fn new(name: &str, tools: Vec<McpTool>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            tools: Mutex::new(tools),
            replies: Mutex::new(HashMap::new()),
            fail_listing: AtomicBool::new(false),
            connected: AtomicBool::new(true),
            list_calls: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn set_tools(&self, tools: Vec<McpTool>) {
        *self.tools.lock() = tools;
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn set_reply(&self, tool: &str, texts: &[&str], is_error: bool) {
        let result = ToolCallResult {
            content: texts
                .iter()
                .map(|t| ContentItem {
                    content_type: "text".to_string(),
                    text: Some(t.to_string()),
                })
                .collect(),
            is_error,
        };
        self.replies.lock().insert(tool.to_string(), result);
    }
}

#[async_trait]
impl BackendClient for FakeBackend {
    async fn list_tools(&self) -> std::result::Result<Vec<McpTool>, McpError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(McpError::Server("catalog unavailable".into()));
        }
        Ok(self.tools.lock().clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> std::result::Result<ToolCallResult, McpError> {
        self.calls.lock().push((name.to_string(), arguments));
        if let Some(reply) = self.replies.lock().get(name) {
            return Ok(reply.clone());
        }
        Ok(ToolCallResult {
            content: vec![ContentItem {
                content_type: "text".to_string(),
                text: Some(format!("{}:{}", self.name, name)),
            }],
            is_error: false,
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> std::result::Result<(), McpError> {
        self.closed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing out fake backends by config name. Unknown names fail
/// to connect, like an unreachable endpoint.
#[derive(Default)]
pub struct FakeConnector {
    backends: Mutex<HashMap<String, Arc<FakeBackend>>>,
    pub connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new(backends: &[Arc<FakeBackend>]) -> Arc<Self> {
        let map = backends
            .iter()
            .map(|b| (b.name.clone(), Arc::clone(b)))
            .collect();
        Arc::new(Self {
            backends: Mutex::new(map),
            connects: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl BackendConnector for FakeConnector {
    async fn connect(&self, config: &BackendConfig) -> std::result::Result<Arc<dyn BackendClient>, McpError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let backend = self
            .backends
            .lock()
            .get(&config.name)
            .cloned()
            .ok_or_else(|| McpError::Transport(format!("connection refused: {}", config.endpoint())))?;
        backend.connected.store(true, Ordering::SeqCst);
        Ok(backend)
    }
}

/// Manager over the given fakes, configured with one SSE entry per name
pub fn manager(connector: Arc<FakeConnector>, names: &[&str]) -> Arc<BackendConnectionManager> {
    let configs = names
        .iter()
        .map(|name| BackendConfig::sse(*name, format!("http://{}.test/sse", name)))
        .collect();
    Arc::new(BackendConnectionManager::with_connector(configs, connector))
}
