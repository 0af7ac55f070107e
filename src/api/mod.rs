//! HTTP API.
//!
//! - `GET  /api/health`
//! - `GET  /api/tools`
//! - `POST /api/chat`: start or continue an in-memory session
//! - `GET|DELETE /api/sessions/:id`
//! - `POST /api/tasks`: one-shot run

mod routes;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::agent::Agent;

pub use routes::{AppState, Session};

/// Build the application router.
pub fn router(agent: Arc<Agent>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(routes::routes())
        .with_state(Arc::new(AppState::new(agent)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Bind to the configured address and serve until the process exits.
pub async fn serve(agent: Arc<Agent>) -> anyhow::Result<()> {
    let config = agent.config();
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address {}:{}: {}", config.host, config.port, e))?;

    let app = router(Arc::clone(&agent));

    tracing::info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
