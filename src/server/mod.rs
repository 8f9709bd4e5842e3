//! HTTP surface of the dashboard.

pub mod error;
pub mod routes;

use crate::core::config::ServerConfig;
use crate::providers::ApiKeyPool;
use crate::service::{QueryService, RefreshService};
use anyhow::{Context, Result};
use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub query: Arc<QueryService>,
    pub refresh: Arc<RefreshService>,
    pub keys: Arc<ApiKeyPool>,
    pub started_at: DateTime<Utc>,
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let vendors = Router::new()
        .route("/", get(routes::list_vendors))
        .route("/:ticker", get(routes::vendor).delete(routes::evict_vendor))
        .route("/:ticker/summary", get(routes::vendor_summary))
        .route("/:ticker/trends", get(routes::vendor_trends))
        .route("/:ticker/overview", get(routes::vendor_overview))
        .route("/:ticker/metrics", get(routes::vendor_metrics))
        .route("/:ticker/refresh", post(routes::refresh_vendor));

    let api = Router::new()
        .nest("/vendors", vendors)
        .route("/comparison", get(routes::comparison))
        .route("/cache/clear", post(routes::clear_cache))
        .route("/initialize-vendors", post(routes::initialize_vendors))
        .route("/keys/status", get(routes::key_status));

    Router::new()
        .route("/health", get(routes::health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config))
        .with_state(state)
}

/// Serves the API until interrupted.
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<()> {
    let app = router(state, config);
    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("vendor-health listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .context("Server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::service::tests::{MockProvider, company, start, target_vendors};
    use crate::store::CacheStore;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(provider: MockProvider) -> Router {
        let clock = Arc::new(ManualClock::new(start()));
        let store = Arc::new(CacheStore::in_memory(clock, chrono::Duration::hours(24)));
        let refresh = RefreshService::new(store.clone(), Arc::new(provider), target_vendors());
        let query = Arc::new(QueryService::new(store, refresh.clone(), target_vendors()));
        let state = AppState {
            query,
            refresh,
            keys: Arc::new(ApiKeyPool::new(vec!["ABCDEFGHIJKL".to_string()])),
            started_at: start(),
        };
        router(state, &ServerConfig::default())
    }

    async fn request(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_summary_for_known_ticker() {
        let provider = MockProvider::default();
        provider.set("TEL", Ok(company("TEL", &[(2024, 100.0)])));

        let (status, body) =
            request(app(provider), Method::GET, "/api/v1/vendors/tel/summary").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vendor"]["ticker"], "TEL");
        assert_eq!(body["metrics"]["current_ratio"], 1.5);
        assert_eq!(body["stale"], false);
    }

    #[tokio::test]
    async fn test_summary_for_unknown_ticker_is_404() {
        let (status, body) = request(
            app(MockProvider::default()),
            Method::GET,
            "/api/v1/vendors/NOPE/summary",
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("NOPE"));
    }

    #[tokio::test]
    async fn test_exhausted_pool_is_429() {
        let provider = MockProvider::default();
        provider.set("ST", Err(crate::core::VendorError::PoolExhausted { attempts: 1 }));

        let (status, _) = request(app(provider), Method::POST, "/api/v1/vendors/ST/refresh").await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_initialize_vendors_reports_failures() {
        let provider = MockProvider::default();
        provider.set("TEL", Ok(company("TEL", &[(2024, 100.0)])));

        let (status, body) =
            request(app(provider), Method::POST, "/api/v1/initialize-vendors").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["refreshed"], serde_json::json!(["TEL"]));
        assert_eq!(body["failed"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_single_vendor_comes_from_the_store() {
        let provider = MockProvider::default();
        provider.set("DD", Ok(company("DD", &[(2024, 100.0)])));
        let app = app(provider);

        let (status, _) = request(app.clone(), Method::GET, "/api/v1/vendors/DD").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        request(app.clone(), Method::POST, "/api/v1/vendors/DD/refresh").await;
        let (status, body) = request(app, Method::GET, "/api/v1/vendors/dd").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ticker"], "DD");
        assert_eq!(body["name"], "DuPont de Nemours");
    }

    #[tokio::test]
    async fn test_cache_eviction_routes() {
        let provider = MockProvider::default();
        for ticker in ["TEL", "ST"] {
            provider.set(ticker, Ok(company(ticker, &[(2024, 100.0)])));
        }
        let app = app(provider);
        request(app.clone(), Method::POST, "/api/v1/vendors/TEL/refresh").await;
        request(app.clone(), Method::POST, "/api/v1/vendors/ST/refresh").await;

        let (status, body) = request(app.clone(), Method::DELETE, "/api/v1/vendors/tel").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["evicted"], "TEL");

        let (status, _) = request(app.clone(), Method::DELETE, "/api/v1/vendors/TEL").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = request(app.clone(), Method::POST, "/api/v1/cache/clear").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cleared"], 1);

        let (_, body) = request(app, Method::GET, "/api/v1/vendors").await;
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_key_status_is_masked() {
        let (status, body) = request(
            app(MockProvider::default()),
            Method::GET,
            "/api/v1/keys/status",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_keys"], 1);
        assert_eq!(body["current_key"], "ABCDEF...");
        assert_eq!(body["usage"][0]["index"], 0);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) =
            request(app(MockProvider::default()), Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
}
