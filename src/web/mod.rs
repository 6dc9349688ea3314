//! HTTP front end: the search form, its JSON endpoint, and liveness/metrics
//!
//! Routes:
//! - `GET /` - HTML form
//! - `POST /api/search` - `{"openai_key","serper_key","query"}` -> `{"result"}`
//! - `GET /api/examples` - example queries
//! - `GET /live` - liveness probe
//! - `GET /metrics` - metrics snapshot

use crate::config::{ConfigError, ServerSection};
use crate::error::{ShopperError, ShopperResult};
use crate::observability::metrics::metrics;
use crate::service::{ShoppingService, EXAMPLE_QUERIES};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use warp::{Filter, Rejection, Reply};

const INDEX_HTML: &str = include_str!("index.html");

/// Largest accepted search request body
const MAX_REQUEST_BYTES: u64 = 64 * 1024;

/// Form submission; missing fields are treated as blank
#[derive(Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub openai_key: String,
    #[serde(default)]
    pub serper_key: String,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub result: String,
}

#[derive(Debug, Serialize)]
struct LiveResponse {
    status: &'static str,
    timestamp: u64,
}

/// Every route of the front end
pub fn routes(
    service: ShoppingService,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let index_route = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::html(INDEX_HTML));

    let search_route = warp::path!("api" / "search")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_REQUEST_BYTES))
        .and(warp::body::json())
        .and(with_service(service))
        .and_then(handle_search);

    let examples_route = warp::path!("api" / "examples")
        .and(warp::get())
        .map(|| warp::reply::json(&EXAMPLE_QUERIES));

    let live_route = warp::path("live").and(warp::path::end()).and(warp::get()).map(|| {
        warp::reply::json(&LiveResponse {
            status: "alive",
            timestamp: current_timestamp(),
        })
    });

    let metrics_route = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&metrics().get_metrics()));

    index_route
        .or(search_route)
        .or(examples_route)
        .or(live_route)
        .or(metrics_route)
        .with(warp::trace::request())
}

fn with_service(
    service: ShoppingService,
) -> impl Filter<Extract = (ShoppingService,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

/// Validation and run errors travel in `result`; the status is always 200
async fn handle_search(
    request: SearchRequest,
    service: ShoppingService,
) -> Result<impl Reply, Infallible> {
    let result = service
        .search_products(&request.openai_key, &request.serper_key, &request.query)
        .await;

    Ok(warp::reply::json(&SearchResponse { result }))
}

/// Parse `host:port` from the server section
pub fn bind_address(server: &ServerSection) -> ShopperResult<SocketAddr> {
    format!("{}:{}", server.host, server.port)
        .parse()
        .map_err(|e| {
            ShopperError::Config(ConfigError::InvalidConfig(format!(
                "server address {}:{} is invalid: {e}",
                server.host, server.port
            )))
        })
}

/// Serve until `shutdown` resolves
pub async fn serve_with_shutdown(
    service: ShoppingService,
    server: &ServerSection,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> ShopperResult<()> {
    let addr = bind_address(server)?;

    let (bound, running) = warp::serve(routes(service))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|e| ShopperError::internal_error(format!("Failed to bind {addr}: {e}")))?;

    info!(address = %bound, "Shopping assistant listening");
    running.await;
    info!("Web server stopped");
    Ok(())
}

/// Serve until Ctrl-C
pub async fn serve(service: ShoppingService, server: &ServerSection) -> ShopperResult<()> {
    serve_with_shutdown(service, server, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
        }
    })
    .await
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let server = ServerSection::default();
        assert_eq!(bind_address(&server).unwrap().port(), 7860);

        let bad = ServerSection {
            host: "not a host".to_string(),
            port: 80,
        };
        assert!(matches!(bind_address(&bad), Err(ShopperError::Config(_))));
    }

    #[test]
    fn test_search_request_defaults_missing_fields() {
        let request: SearchRequest = serde_json::from_str(r#"{"query": "monitor"}"#).unwrap();
        assert!(request.openai_key.is_empty());
        assert!(request.serper_key.is_empty());
        assert_eq!(request.query, "monitor");
    }

    #[test]
    fn test_index_contains_form_fields() {
        for id in ["openai_key", "serper_key", "query", "result"] {
            assert!(INDEX_HTML.contains(&format!("id=\"{id}\"")), "missing {id}");
        }
    }
}
