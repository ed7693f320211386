//! Reverse proxy for the onboarding flow backend
//!
//! Forwards client-origin calls under `/api/onboarding` to the configured
//! backend base URL. Configuration is resolved once at process start into
//! an immutable value injected into the handlers; an unconfigured base
//! fails closed per request with a machine-readable payload instead of
//! attempting the call.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Immutable proxy configuration.
#[derive(Debug, Clone)]
struct ProxyConfig {
    backend_base: Option<String>,
    port: u16,
}

impl ProxyConfig {
    fn from_env() -> Self {
        Self::resolve(
            std::env::var("ONBOARDING_API_BASE").ok().as_deref(),
            std::env::var("PROXY_PORT").ok().as_deref(),
        )
    }

    fn resolve(base: Option<&str>, port: Option<&str>) -> Self {
        Self {
            backend_base: base
                .filter(|v| !v.is_empty())
                .map(|v| v.trim_end_matches('/').to_string()),
            port: port.and_then(|p| p.parse().ok()).unwrap_or(3000),
        }
    }
}

#[derive(Clone)]
struct AppState {
    config: Arc<ProxyConfig>,
    client: reqwest::Client,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proxy=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ProxyConfig::from_env();
    if config.backend_base.is_none() {
        tracing::warn!("ONBOARDING_API_BASE is not set; requests will fail closed");
    }

    let port = config.port;
    let state = AppState {
        config: Arc::new(config),
        client: reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client"),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Compass proxy listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/onboarding/:op", post(forward))
        .with_state(state)
}

async fn forward(
    State(state): State<AppState>,
    Path(op): Path<String>,
    body: Option<Json<Value>>,
) -> impl IntoResponse {
    let Some(base) = state.config.backend_base.as_deref() else {
        return configuration_error();
    };

    let Json(body) = body.unwrap_or(Json(json!({})));
    let url = format!("{base}/onboarding/{op}");
    tracing::debug!(%url, "forwarding request");

    let upstream = match state.client.post(&url).json(&body).send().await {
        Ok(resp) => resp,
        Err(err) => {
            tracing::error!(%err, %url, "upstream request failed");
            return transport_error(&err.to_string());
        }
    };

    let status = upstream.status().as_u16();
    match upstream.text().await {
        Ok(raw) => {
            if status >= 400 {
                tracing::warn!(status, body = %raw, "upstream error relayed");
            }
            relay(status, &raw)
        }
        Err(err) => transport_error(&err.to_string()),
    }
}

/// Relay an upstream response with its original status, parsing the body
/// as JSON when possible and wrapping raw text otherwise.
fn relay(status: u16, raw: &str) -> (StatusCode, Json<Value>) {
    let body = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| json!({ "raw": raw }));
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, Json(body))
}

/// Fail closed: never attempt an unconfigured upstream call.
fn configuration_error() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "detail": "Proxy configuration error",
            "error": "ONBOARDING_API_BASE not configured",
        })),
    )
}

fn transport_error(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "detail": "Proxy transport error",
            "error": message,
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults_and_trims_base() {
        let config = ProxyConfig::resolve(Some("http://127.0.0.1:8001/"), None);
        assert_eq!(config.backend_base.as_deref(), Some("http://127.0.0.1:8001"));
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn resolve_treats_empty_base_as_unset() {
        let config = ProxyConfig::resolve(Some(""), Some("4000"));
        assert!(config.backend_base.is_none());
        assert_eq!(config.port, 4000);
    }

    #[test]
    fn configuration_error_is_machine_readable() {
        let (status, Json(body)) = configuration_error();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Proxy configuration error");
        assert_eq!(body["error"], "ONBOARDING_API_BASE not configured");
    }

    #[test]
    fn relay_preserves_status_and_parses_json() {
        let (status, Json(body)) = relay(404, r#"{"detail": "Session not found"}"#);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Session not found");
    }

    #[test]
    fn relay_wraps_non_json_bodies() {
        let (status, Json(body)) = relay(200, "not-json");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["raw"], "not-json");
    }

    #[test]
    fn relay_guards_bogus_status_codes() {
        let (status, _) = relay(1, "{}");
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
