//! HTTP server: shared state, router, and startup.

pub mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{Config, Metadata};
use crate::error::Result;
use crate::pygeoapi::PyGeoApiClient;
use crate::registry::SourceRegistry;
use crate::repository::Db;

/// Shared state for the web server. Clones share the pool, the registry
/// snapshot, and the outbound HTTP client.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub registry: Arc<SourceRegistry>,
    pub pygeoapi: PyGeoApiClient,
    /// Fully qualified base of every emitted URL.
    pub base_url: String,
    /// Path prefix the router is mounted under.
    pub prefix: String,
    pub pretty: bool,
    pub metadata: Metadata,
}

impl AppState {
    /// Connect to the database, load the source registry, and assemble
    /// the state. Fails fast when the database is unreachable.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = Db::connect(&config.database)?;
        db.ping().await?;
        let registry = SourceRegistry::load(&db.sources()).await?;
        Self::assemble(config, db, registry)
    }

    /// Assemble state from parts already in hand.
    pub fn assemble(config: &Config, db: Db, registry: SourceRegistry) -> Result<Self> {
        let prefix = match config.server.prefix.trim_matches('/') {
            "" => String::new(),
            trimmed => format!("/{trimmed}"),
        };
        Ok(AppState {
            db,
            registry: Arc::new(registry),
            pygeoapi: PyGeoApiClient::new(&config.server)?,
            base_url: config.server.base_url(),
            prefix,
            pretty: config.server.pretty_print,
            metadata: config.metadata.clone(),
        })
    }
}

/// Start the web server.
pub async fn serve(config: &Config, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::from_config(config).await?;
    let prefix = state.prefix.clone();
    let app = create_router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    tracing::info!("Serving the NLDI at http://{addr}{prefix}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use tower::ServiceExt;

    use crate::model::{ColumnMapping, CrawlerSource, IngestType};

    fn source(id: i32, suffix: &str, name: &str, ingest: IngestType) -> CrawlerSource {
        CrawlerSource {
            source_id: id,
            suffix: suffix.to_string(),
            name: name.to_string(),
            uri: format!("https://example.gov/{suffix}"),
            columns: ColumnMapping {
                feature_id: "provider_id".to_string(),
                feature_name: "name".to_string(),
                feature_uri: "subjectOf".to_string(),
                feature_reach: None,
                feature_measure: None,
            },
            ingest_type: ingest,
            feature_type: Some("hydrolocation".to_string()),
        }
    }

    /// State with a populated registry and a lazy pool; routes that
    /// validate parameters or read the registry never touch the
    /// database.
    fn test_app() -> Router {
        let config = Config::default();
        let db = Db::connect(&config.database).unwrap();
        let registry = SourceRegistry::from_sources(vec![
            source(2, "huc12pp", "HUC12 Pour Points", IngestType::Point),
            source(5, "nwissite", "NWIS Surface Water Sites", IngestType::Reach),
            source(1, "wqp", "Water Quality Portal", IngestType::Point),
        ]);
        create_router(AppState::assemble(&config, db, registry).unwrap())
    }

    async fn get_json(
        app: Router,
        uri: &str,
    ) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_landing_page() {
        let (status, json) = get_json(test_app(), "/api/nldi/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["title"], "Network Linked Data Index");
        assert!(json["links"].as_array().unwrap().len() >= 3);
    }

    #[tokio::test]
    async fn test_list_sources_starts_with_comid() {
        let (status, json) = get_json(test_app(), "/api/nldi/linked-data").await;
        assert_eq!(status, StatusCode::OK);
        let sources = json.as_array().unwrap();
        assert_eq!(sources[0]["source"], "comid");
        assert_eq!(sources[0]["sourceName"], "NHDPlus comid");
        // Registered sources follow in source_id order.
        assert_eq!(sources[1]["source"], "wqp");
        assert_eq!(sources[2]["source"], "huc12pp");
        assert_eq!(sources[3]["source"], "nwissite");
    }

    #[tokio::test]
    async fn test_unknown_source_is_404() {
        let (status, json) = get_json(test_app(), "/api/nldi/linked-data/nosuch/ID-1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "NotFound");
    }

    #[tokio::test]
    async fn test_non_numeric_comid_is_400() {
        let (status, json) = get_json(test_app(), "/api/nldi/linked-data/comid/notanumber").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "InvalidInput");
    }

    #[tokio::test]
    async fn test_navigation_modes_for_comid_include_point_to_point() {
        let (status, json) =
            get_json(test_app(), "/api/nldi/linked-data/comid/13297198/navigation").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["pointToPoint"].as_str().unwrap().ends_with("/PP"));
        assert!(json["upstreamMain"].as_str().unwrap().ends_with("/UM"));
    }

    #[tokio::test]
    async fn test_navigation_modes_for_crawler_source_omit_point_to_point() {
        let (status, json) = get_json(
            test_app(),
            "/api/nldi/linked-data/nwissite/USGS-05428500/navigation",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.get("pointToPoint").is_none());
        assert!(json["downstreamDiversions"].as_str().unwrap().ends_with("/DD"));
    }

    #[tokio::test]
    async fn test_navigation_info_lists_flowlines_and_sources() {
        let (status, json) = get_json(
            test_app(),
            "/api/nldi/linked-data/comid/13297198/navigation/UT",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let entries = json.as_array().unwrap();
        assert_eq!(entries[0]["source"], "Flowlines");
        assert!(entries.iter().any(|e| e["source"] == "nwissite"));
    }

    #[tokio::test]
    async fn test_unknown_mode_is_400() {
        let (status, json) = get_json(
            test_app(),
            "/api/nldi/linked-data/comid/13297198/navigation/XX",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "InvalidInput");
    }

    #[tokio::test]
    async fn test_point_to_point_without_stop_comid_is_400() {
        let (status, json) = get_json(
            test_app(),
            "/api/nldi/linked-data/comid/13297198/navigation/PP/flowlines?distance=10",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "InvalidInput");
    }

    #[tokio::test]
    async fn test_out_of_range_distance_is_400() {
        for query in ["distance=0", "distance=10000", "distance=-1", "distance=abc", ""] {
            let uri = format!(
                "/api/nldi/linked-data/comid/13297198/navigation/UM/flowlines?{query}"
            );
            let (status, json) = get_json(test_app(), &uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "query={query}");
            assert_eq!(json["code"], "InvalidInput");
        }
    }

    #[tokio::test]
    async fn test_stop_comid_rejected_for_upstream_modes() {
        let (status, json) = get_json(
            test_app(),
            "/api/nldi/linked-data/comid/13297198/navigation/UT/flowlines?distance=10&stopComid=42",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "InvalidInput");
    }

    #[tokio::test]
    async fn test_unknown_data_source_is_404() {
        let (status, json) = get_json(
            test_app(),
            "/api/nldi/linked-data/comid/13297198/navigation/UM/nosuch?distance=10",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "NotFound");
    }

    #[tokio::test]
    async fn test_position_requires_coords() {
        let (status, json) = get_json(test_app(), "/api/nldi/linked-data/comid/position").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "InvalidInput");
    }

    #[tokio::test]
    async fn test_malformed_point_is_400() {
        let (status, json) = get_json(
            test_app(),
            "/api/nldi/linked-data/comid/position?coords=POINT(-89.509)",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "InvalidInput");

        let (status, _) = get_json(
            test_app(),
            "/api/nldi/linked-data/hydrolocation?coords=POINT(-190%2043)",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_paging_validation() {
        let (status, json) =
            get_json(test_app(), "/api/nldi/linked-data/wqp?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "InvalidInput");

        let (status, _) = get_json(test_app(), "/api/nldi/linked-data/wqp?limit=10001").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(test_app(), "/api/nldi/linked-data/wqp?offset=-5").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_openapi_json_and_unacceptable_format() {
        let (status, json) = get_json(test_app(), "/api/nldi/openapi").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["info"]["title"], "Network Linked Data Index");
        assert!(json["paths"]
            .as_object()
            .unwrap()
            .contains_key("/linked-data/{source}/{featureId}/navigation/{mode}/{dataSource}"));

        let (status, json) = get_json(test_app(), "/api/nldi/openapi?f=csv").await;
        assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
        assert_eq!(json["code"], "NotAcceptable");
    }

    #[tokio::test]
    async fn test_openapi_yaml() {
        let app = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/nldi/openapi?f=yaml")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.contains("yaml"));
    }

    #[tokio::test]
    async fn test_powered_by_header() {
        let app = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/nldi/linked-data")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let header = response
            .headers()
            .get("x-powered-by")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(header.starts_with("nldi "));
    }
}
