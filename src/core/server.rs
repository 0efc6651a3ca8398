//! Gateway server handle and MCP protocol implementation.
//!
//! [`Gateway`] wires the tool registry, the dispatcher and the event bus
//! together. Every transport works against a clone of it: the HTTP transport
//! through its REST routes, STDIO and TCP through [`ServerHandler`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, model::*, service::RequestContext,
};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::config::Config;
use crate::domains::events::EventBus;
use crate::domains::store::{SqliteStore, ToolStore};
use crate::domains::tools::{
    Backends, CallOutcome, CallRequest, CallStatus, Dispatcher, ReqwestClient, SqlBackend,
    ToolRegistry,
};

/// The running gateway: catalogue, dispatch and outcome stream.
#[derive(Clone)]
pub struct Gateway {
    config: Arc<Config>,
    registry: Arc<ToolRegistry>,
    dispatcher: Dispatcher,
    mcp_calls: Arc<AtomicU64>,
}

impl Gateway {
    /// Assemble a gateway over the given store and backends.
    ///
    /// The catalogue starts empty; call [`ToolRegistry::reload`] to load it.
    pub fn new(config: Config, store: Arc<dyn ToolStore>, backends: Backends) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(ToolRegistry::new(store, backends));
        let events = EventBus::new(config.dispatch.event_buffer);
        let dispatcher = Dispatcher::new(registry.clone(), events, config.dispatch.detached);

        Self {
            config,
            registry,
            dispatcher,
            mcp_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open the configured SQLite store, wire the reqwest client and load the
    /// catalogue.
    ///
    /// A failed initial load is logged and leaves the catalogue empty; a
    /// later reload can recover.
    pub async fn open(config: Config) -> crate::Result<Self> {
        let store = SqliteStore::open(&config.store.database_path)?;
        info!("Tool store opened at {:?}", config.store.database_path);

        let sql: Arc<dyn SqlBackend> = Arc::new(store.clone());
        let backends = Backends::new(Arc::new(ReqwestClient::new()), sql);
        let gateway = Self::new(config, Arc::new(store), backends);

        match gateway.registry.reload().await {
            Ok(count) => info!("Loaded {} tool(s)", count),
            Err(e) => warn!("Starting with an empty catalogue: {}", e),
        }

        Ok(gateway)
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn events(&self) -> &EventBus<CallOutcome> {
        self.dispatcher.events()
    }

    fn next_mcp_cid(&self) -> String {
        format!("mcp-{}", self.mcp_calls.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Render a tool result as MCP text content.
fn result_text(result: Value) -> String {
    match result {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

impl ServerHandler for Gateway {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Tool gateway. Tools are loaded from the tool store and proxy HTTP endpoints \
                 or run bounded SQL reads."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    #[instrument(skip(self, _context))]
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let catalogue = self.registry.snapshot();
        info!(generation = catalogue.generation(), "Listing tools");

        let tools = catalogue
            .tools()
            .map(|tool| {
                let definition = &tool.definition;
                let schema = definition
                    .input_schema()
                    .as_object()
                    .cloned()
                    .unwrap_or_default();
                Tool {
                    name: definition.name.clone().into(),
                    description: Some(definition.description.clone().into()),
                    input_schema: Arc::new(schema),
                    annotations: None,
                    output_schema: None,
                    icons: None,
                    meta: None,
                    title: None,
                }
            })
            .collect();

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip(self, request, _context), fields(tool = %request.name))]
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let call = CallRequest::new(
            self.next_mcp_cid(),
            request.name.to_string(),
            request.arguments.unwrap_or_default(),
        );

        let outcome = self.dispatcher.dispatch(call).await;
        Ok(match outcome.status {
            CallStatus::Success { result } => {
                CallToolResult::success(vec![Content::text(result_text(result))])
            }
            CallStatus::Error { error } => CallToolResult::error(vec![Content::text(error)]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::testing::{FakeStore, fake_backends};
    use crate::domains::tools::{HttpMethod, ToolDefinition};
    use serde_json::json;

    fn gateway(store: FakeStore) -> Gateway {
        let (backends, _, _) = fake_backends();
        let mut config = Config::default();
        config.dispatch.detached = false;
        Gateway::new(config, Arc::new(store), backends)
    }

    #[tokio::test]
    async fn test_new_gateway_starts_empty() {
        let gw = gateway(FakeStore::with_rows(vec![ToolDefinition::http(
            "echo",
            "",
            HttpMethod::Get,
            "http://svc",
        )]));
        assert!(gw.registry().list().is_empty());

        gw.registry().reload().await.unwrap();
        assert_eq!(gw.registry().tool_names(), vec!["echo".to_string()]);
    }

    #[tokio::test]
    async fn test_open_in_memory_store() {
        let mut config = Config::default();
        config.store.database_path = ":memory:".into();

        let gw = Gateway::open(config).await.unwrap();
        assert!(gw.registry().list().is_empty());
        assert_eq!(gw.registry().snapshot().generation(), 1);
    }

    #[test]
    fn test_mcp_cids_are_unique() {
        let gw = gateway(FakeStore::new());
        assert_eq!(gw.next_mcp_cid(), "mcp-1");
        assert_eq!(gw.next_mcp_cid(), "mcp-2");
        assert_eq!(gw.clone().next_mcp_cid(), "mcp-3");
    }

    #[test]
    fn test_result_text() {
        assert_eq!(result_text(json!("plain")), "plain");
        assert_eq!(result_text(json!([{ "id": 1 }])), r#"[{"id":1}]"#);
    }

    #[test]
    fn test_info_enables_tools() {
        let info = gateway(FakeStore::new()).get_info();
        assert!(info.capabilities.tools.is_some());
    }
}
