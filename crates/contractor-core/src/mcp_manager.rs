//! Remote tool backend manager
//!
//! Owns connections to the configured MCP backends, discovers the tools
//! each one exposes and proxies tool calls to the backend that claimed
//! the tool name.
//!
//! Connections are opened lazily on first use and kept until
//! [`BackendConnectionManager::dispose`].

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use contractor_mcp::{
    ClientInfo, McpClient, McpError, McpTool, SseTransport, StdioTransport, ToolCallResult,
    Transport,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{BackendConfig, BackendTransport};
use crate::error::ToolError;
use crate::tools::{empty_parameters_schema, ToolDefinition};

/// A live connection to one backend
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<McpTool>, McpError>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError>;

    fn is_connected(&self) -> bool;

    async fn close(&self) -> Result<(), McpError>;
}

#[async_trait]
impl<T: Transport + 'static> BackendClient for McpClient<T> {
    async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        McpClient::list_tools(self).await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        McpClient::call_tool(self, name, arguments).await
    }

    fn is_connected(&self) -> bool {
        McpClient::is_connected(self)
    }

    async fn close(&self) -> Result<(), McpError> {
        McpClient::close(self).await
    }
}

/// Opens connections to backends
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self, config: &BackendConfig) -> Result<Arc<dyn BackendClient>, McpError>;
}

/// Connects over SSE or stdio and performs the MCP handshake
#[derive(Debug, Clone)]
pub struct McpConnector {
    client_info: ClientInfo,
}

impl Default for McpConnector {
    fn default() -> Self {
        Self {
            client_info: ClientInfo {
                name: "contractor-agent".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

impl McpConnector {
    pub fn new(client_info: ClientInfo) -> Self {
        Self { client_info }
    }

    async fn handshake<T: Transport + 'static>(
        &self,
        transport: T,
        backend: &str,
    ) -> Result<Arc<dyn BackendClient>, McpError> {
        let mut client = McpClient::new(transport);
        let server = client.initialize(self.client_info.clone()).await?;
        info!(backend, server = %server.name, version = %server.version, "MCP backend initialized");
        Ok(Arc::new(client))
    }
}

#[async_trait]
impl BackendConnector for McpConnector {
    async fn connect(&self, config: &BackendConfig) -> Result<Arc<dyn BackendClient>, McpError> {
        match &config.transport {
            BackendTransport::Sse { url } => {
                let transport = SseTransport::connect(url)
                    .await
                    .map_err(|e| McpError::Transport(e.to_string()))?;
                self.handshake(transport, &config.name).await
            }
            BackendTransport::Stdio { command, args, env } => {
                let transport = StdioTransport::spawn(command, args, env)
                    .await
                    .map_err(|e| McpError::Transport(e.to_string()))?;
                self.handshake(transport, &config.name).await
            }
        }
    }
}

/// A connected backend and the tools it claimed
#[derive(Clone)]
pub struct BackendRegistration {
    pub name: String,
    pub endpoint: String,
    pub client: Arc<dyn BackendClient>,
    pub tool_names: HashSet<String>,
}

/// Summary information about a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStatus {
    pub name: String,
    pub endpoint: String,
    pub connected: bool,
    pub tool_count: usize,
}

#[derive(Default)]
struct BackendState {
    /// In configuration order
    registrations: Vec<BackendRegistration>,
    /// Tool name -> backend name
    routes: HashMap<String, String>,
}

impl BackendState {
    fn registration(&self, backend: &str) -> Option<&BackendRegistration> {
        self.registrations.iter().find(|r| r.name == backend)
    }

    /// Route `tool` to `backend` unless an earlier backend already owns it
    fn claim(&mut self, tool: &str, backend: &str) {
        let owner = self.routes.get(tool).cloned();
        match owner {
            Some(owner) if owner != backend => {
                warn!(tool, owner = %owner, shadowed = backend, "Tool already claimed by another backend");
            }
            Some(_) => {}
            None => {
                self.routes.insert(tool.to_string(), backend.to_string());
            }
        }
        if let Some(reg) = self.registrations.iter_mut().find(|r| r.name == backend) {
            reg.tool_names.insert(tool.to_string());
        }
    }
}

/// Manager for remote tool backends
pub struct BackendConnectionManager {
    configs: Vec<BackendConfig>,
    connector: Arc<dyn BackendConnector>,
    /// Set once every configured backend has been attempted
    initialized: tokio::sync::Mutex<bool>,
    state: RwLock<BackendState>,
}

impl BackendConnectionManager {
    /// Create a manager that connects with the MCP connector
    pub fn new(configs: Vec<BackendConfig>) -> Self {
        Self::with_connector(configs, Arc::new(McpConnector::default()))
    }

    pub fn with_connector(configs: Vec<BackendConfig>, connector: Arc<dyn BackendConnector>) -> Self {
        Self {
            configs,
            connector,
            initialized: tokio::sync::Mutex::new(false),
            state: RwLock::new(BackendState::default()),
        }
    }

    /// Manager with no backends
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Connect to every configured backend and record its catalog.
    ///
    /// Idempotent. A backend that fails to connect or list its tools is
    /// logged and left out; the others are unaffected.
    pub async fn ensure_initialized(&self) {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return;
        }

        for config in &self.configs {
            let client = match self.connector.connect(config).await {
                Ok(client) => client,
                Err(e) => {
                    warn!(backend = %config.name, endpoint = %config.endpoint(), error = %e, "Failed to connect to backend");
                    continue;
                }
            };

            let tools = match client.list_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    warn!(backend = %config.name, error = %e, "Failed to fetch backend tool catalog");
                    if let Err(e) = client.close().await {
                        debug!(backend = %config.name, error = %e, "Error closing failed backend");
                    }
                    continue;
                }
            };

            let mut state = self.state.write();
            state.registrations.push(BackendRegistration {
                name: config.name.clone(),
                endpoint: config.endpoint(),
                client,
                tool_names: HashSet::new(),
            });
            for tool in &tools {
                state.claim(&tool.name, &config.name);
            }
            info!(backend = %config.name, tools = tools.len(), "Registered backend");
        }

        *initialized = true;
    }

    /// Live tool definitions from every connected backend.
    ///
    /// Catalogs are re-fetched on each call since remote catalogs can
    /// change. A backend whose fetch fails contributes nothing. Names are
    /// unique, and the routing table is rebuilt to match, so a call always
    /// reaches the backend whose definition was advertised.
    pub async fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.ensure_initialized().await;

        let connected: Vec<(String, Arc<dyn BackendClient>)> = {
            let state = self.state.read();
            state
                .registrations
                .iter()
                .filter(|r| r.client.is_connected())
                .map(|r| (r.name.clone(), r.client.clone()))
                .collect()
        };

        let fetches = connected.into_iter().map(|(name, client)| async move {
            let result = client.list_tools().await;
            (name, result)
        });
        let results = futures::future::join_all(fetches).await;

        // Routes follow what is advertised: the first backend in
        // configuration order that lists a name now owns it.
        let mut definitions = Vec::new();
        let mut routes = HashMap::new();
        let mut state = self.state.write();
        for (backend, result) in results {
            let tools = match result {
                Ok(tools) => tools,
                Err(e) => {
                    warn!(backend = %backend, error = %e, "Skipping backend catalog");
                    continue;
                }
            };

            let mut listed = HashSet::new();
            for tool in tools {
                listed.insert(tool.name.clone());
                match routes.entry(tool.name.clone()) {
                    Entry::Occupied(owner) => {
                        debug!(tool = %tool.name, owner = %owner.get(), shadowed = %backend, "Tool offered by an earlier backend");
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(backend.clone());
                        definitions.push(ToolDefinition {
                            description: tool.description.unwrap_or_default(),
                            parameters: tool.input_schema.unwrap_or_else(empty_parameters_schema),
                            name: tool.name,
                        });
                    }
                }
            }
            if let Some(reg) = state.registrations.iter_mut().find(|r| r.name == backend) {
                reg.tool_names = listed;
            }
        }
        state.routes = routes;

        definitions
    }

    /// Call a remote tool and return its concatenated text output
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        self.ensure_initialized().await;

        let (backend, client) = {
            let state = self.state.read();
            let backend = state
                .routes
                .get(name)
                .cloned()
                .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
            let client = state
                .registration(&backend)
                .map(|r| r.client.clone())
                .filter(|c| c.is_connected())
                .ok_or_else(|| ToolError::BackendUnavailable(backend.clone()))?;
            (backend, client)
        };

        debug!(tool = name, backend = %backend, "Dispatching remote tool call");

        let result = client.call_tool(name, arguments).await.map_err(|e| match e {
            McpError::Transport(msg) => {
                ToolError::BackendUnavailable(format!("{}: {}", backend, msg))
            }
            other => ToolError::ExecutionFailed(format!(
                "Tool '{}' on backend '{}' failed: {}",
                name, backend, other
            )),
        })?;

        let text = result.joined_text();
        if result.is_error {
            let message = if text.is_empty() {
                "Tool execution failed".to_string()
            } else {
                text
            };
            return Err(ToolError::ExecutionFailed(message));
        }

        Ok(text)
    }

    /// Backend that currently owns `tool`, if any
    pub fn route_for(&self, tool: &str) -> Option<String> {
        self.state.read().routes.get(tool).cloned()
    }

    /// List registered backends and their status
    pub fn list_backends(&self) -> Vec<BackendStatus> {
        self.state
            .read()
            .registrations
            .iter()
            .map(|r| BackendStatus {
                name: r.name.clone(),
                endpoint: r.endpoint.clone(),
                connected: r.client.is_connected(),
                tool_count: r.tool_names.len(),
            })
            .collect()
    }

    /// Close every connection and forget all registrations.
    ///
    /// A later call to [`ensure_initialized`](Self::ensure_initialized)
    /// reconnects from scratch.
    pub async fn dispose(&self) {
        let mut initialized = self.initialized.lock().await;

        let registrations = {
            let mut state = self.state.write();
            state.routes.clear();
            std::mem::take(&mut state.registrations)
        };

        for registration in registrations {
            if let Err(e) = registration.client.close().await {
                warn!(backend = %registration.name, error = %e, "Error closing backend connection");
            }
        }

        *initialized = false;
    }
}
