//! The gateway's axum `Router`: one websocket upgrade endpoint plus a
//! health probe, with the same logging/CORS layering wrapped around every
//! route.

use std::sync::Arc;

use axum::routing::get;
use axum::{middleware, Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use super::logging::log_requests;
use super::ws::{ws_upgrade, ConnectorContext};

pub struct ConnectorServer {
    router: Router,
}

impl ConnectorServer {
    pub fn new(context: Arc<ConnectorContext>) -> Self {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let router = Router::new()
            .route("/ws", get(ws_upgrade))
            .route("/healthz", get(healthz))
            .with_state(context)
            .layer(middleware::from_fn(log_requests))
            .layer(cors);

        Self { router }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
