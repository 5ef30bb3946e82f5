//! Model Context Protocol server exposing the qualification tools.
//!
//! The same three tools the assistant uses are published to external MCP
//! clients, over stdio or streamable HTTP mounted at `/mcp`.

use rmcp::handler::server::tool::{ToolCallContext, ToolRouter};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::transport::StreamableHttpServerConfig;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, tower::StreamableHttpService,
};
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt, tool, tool_router};
use tracing::{debug, info, warn};

use milesdesk_core::QualificationTools;
use milesdesk_shared::{MilesdeskError, Result};

/// Path the HTTP transport is mounted at.
pub const MCP_PATH: &str = "/mcp";

/// MCP service wrapping [`QualificationTools`].
#[derive(Clone)]
pub struct QualificationMcpServer {
    tools: QualificationTools,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl QualificationMcpServer {
    pub fn new(tools: QualificationTools) -> Self {
        Self {
            tools,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Fetch the current Flying Blue (Air France-KLM) rules for reaching each status level."
    )]
    async fn get_flying_blue_qualification(&self) -> std::result::Result<CallToolResult, McpError> {
        Ok(to_tool_result(self.tools.flying_blue().await))
    }

    #[tool(description = "Fetch the current Miles & More (Lufthansa Group) status qualification rules.")]
    async fn get_miles_and_more_qualification(&self) -> std::result::Result<CallToolResult, McpError> {
        Ok(to_tool_result(self.tools.miles_and_more().await))
    }

    #[tool(description = "Fetch the status qualification rules of Flying Blue and Miles & More side by side.")]
    async fn compare_qualification(&self) -> std::result::Result<CallToolResult, McpError> {
        Ok(to_tool_result(self.tools.compare_qualification().await))
    }
}

/// Tool failures are reported in-band so the client model can react.
fn to_tool_result(result: Result<String>) -> CallToolResult {
    match result {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(e) => {
            warn!(error = %e, "MCP tool call failed");
            CallToolResult::error(vec![Content::text(format!("Tool error: {e}"))])
        }
    }
}

impl ServerHandler for QualificationMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Milesdesk exposes live airline status qualification rules. Use \
                 compare_qualification to see Flying Blue and Miles & More side by side."
                    .to_string(),
            ),
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        debug!(tool = %request.name, "MCP tool call");
        let tcc = ToolCallContext::new(self, request, context);
        self.tool_router.call(tcc).await
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tool_router.list_all()))
    }
}

impl QualificationMcpServer {
    /// Serve over stdin/stdout until the client disconnects.
    pub async fn serve_stdio(self) -> Result<()> {
        info!("serving MCP over stdio");
        let service = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| MilesdeskError::Network(format!("MCP stdio initialization failed: {e}")))?;

        let reason = service
            .waiting()
            .await
            .map_err(|e| MilesdeskError::Network(format!("MCP stdio session failed: {e}")))?;
        info!(?reason, "MCP stdio session closed");
        Ok(())
    }

    /// Axum router serving streamable HTTP at [`MCP_PATH`].
    pub fn router(self) -> axum::Router {
        let service = StreamableHttpService::new(
            move || Ok(self.clone()),
            LocalSessionManager::default().into(),
            StreamableHttpServerConfig::default(),
        );
        axum::Router::new().nest_service(MCP_PATH, service)
    }

    /// Serve streamable HTTP on `addr` until Ctrl-C.
    pub async fn serve_http(self, addr: std::net::SocketAddr) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| MilesdeskError::Network(format!("failed to bind {addr}: {e}")))?;
        info!(%addr, path = MCP_PATH, "serving MCP over HTTP");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                tokio::signal::ctrl_c().await.ok();
            })
            .await
            .map_err(|e| MilesdeskError::Network(format!("MCP server error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use milesdesk_core::{
        COMPARE_QUALIFICATION, GET_FLYING_BLUE_QUALIFICATION, GET_MILES_AND_MORE_QUALIFICATION,
    };
    use milesdesk_scraper::Fetcher;
    use milesdesk_shared::{FLYING_BLUE, MILES_AND_MORE, Source};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn server_for(mock: &MockServer) -> QualificationMcpServer {
        let sources = vec![
            Source {
                id: FLYING_BLUE.into(),
                airline: "Air France-KLM".into(),
                name: "Flying Blue".into(),
                url: format!("{}/flying-blue", mock.uri()),
            },
            Source {
                id: MILES_AND_MORE.into(),
                airline: "Lufthansa Group".into(),
                name: "Miles & More".into(),
                url: format!("{}/miles-and-more", mock.uri()),
            },
        ];
        let fetcher = Fetcher::new(Duration::from_secs(5))
            .unwrap()
            .allow_private_hosts(true);
        QualificationMcpServer::new(QualificationTools::new(fetcher, sources, 4000))
    }

    #[tokio::test]
    async fn lists_the_three_tools() {
        let mock = MockServer::start().await;
        let server = server_for(&mock);

        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();

        assert_eq!(
            names,
            vec![
                COMPARE_QUALIFICATION,
                GET_FLYING_BLUE_QUALIFICATION,
                GET_MILES_AND_MORE_QUALIFICATION
            ]
        );
    }

    #[tokio::test]
    async fn advertises_tool_capability() {
        let mock = MockServer::start().await;
        let info = server_for(&mock).get_info();
        assert!(info.capabilities.tools.is_some());
    }

    #[tokio::test]
    async fn tool_success_and_failure_results() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flying-blue"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body><main><p>Gold needs 180 XP.</p></main></body></html>"),
            )
            .mount(&mock)
            .await;
        let server = server_for(&mock);

        let ok = server.get_flying_blue_qualification().await.unwrap();
        assert_ne!(ok.is_error, Some(true));

        // Nothing mounted for this path: the fetch fails with a 404.
        let failed = server.get_miles_and_more_qualification().await.unwrap();
        assert_eq!(failed.is_error, Some(true));
    }
}
