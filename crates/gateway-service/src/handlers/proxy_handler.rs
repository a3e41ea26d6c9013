//! Catch-all handler for proxied routes.

use crate::errors::GatewayError;
use crate::services::ProxyForwarder;
use axum::{
    extract::{Path, Request, State},
    response::Response,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Application state shared across proxied routes.
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<ProxyForwarder>,
}

/// Forward the request to the backend named by the `service` path segment.
///
/// ANY /api/v1/:service
/// ANY /api/v1/:service/*path
pub async fn handle_proxy(
    State(state): State<Arc<AppState>>,
    Path(params): Path<HashMap<String, String>>,
    req: Request,
) -> Result<Response, GatewayError> {
    let service = params.get("service").map(String::as_str).unwrap_or_default();
    state.proxy.forward(service, req).await
}
