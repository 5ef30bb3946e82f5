use std::net::SocketAddr;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use milesdesk_shared::{MilesdeskError, Result};

use crate::routes::{AppState, router};

/// Form routes plus the optional MCP router, with request tracing.
pub fn app(state: AppState, mcp: Option<Router>) -> Router {
    let mut app = router(state);
    if let Some(mcp) = mcp {
        app = app.merge(mcp);
    }
    app.layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve `app` until Ctrl-C.
pub async fn serve(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| MilesdeskError::Network(format!("failed to bind {addr}: {e}")))?;

    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutting down");
        })
        .await
        .map_err(|e| MilesdeskError::Network(format!("server error: {e}")))
}
