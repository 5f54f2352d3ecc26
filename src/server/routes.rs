//! Router configuration.

use axum::http::{HeaderName, HeaderValue};
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use super::handlers;
use super::AppState;

/// Create the router with every endpoint mounted under the configured
/// prefix.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/", get(handlers::root::landing))
        .route("/openapi", get(handlers::root::openapi))
        .route("/linked-data", get(handlers::linked_data::list_sources))
        .route(
            "/linked-data/hydrolocation",
            get(handlers::linked_data::hydrolocation),
        )
        // The static comid segment outranks the :source capture below.
        .route(
            "/linked-data/comid/position",
            get(handlers::linked_data::comid_by_position),
        )
        .route(
            "/linked-data/comid/:comid",
            get(handlers::linked_data::comid_by_id),
        )
        .route("/linked-data/:source", get(handlers::linked_data::list_features))
        .route(
            "/linked-data/:source/:featureId",
            get(handlers::linked_data::feature_by_id),
        )
        .route(
            "/linked-data/:source/:featureId/basin",
            get(handlers::linked_data::basin),
        )
        .route(
            "/linked-data/:source/:featureId/navigation",
            get(handlers::navigation::navigation_modes),
        )
        .route(
            "/linked-data/:source/:featureId/navigation/:mode",
            get(handlers::navigation::navigation_info),
        )
        .route(
            "/linked-data/:source/:featureId/navigation/:mode/:dataSource",
            get(handlers::navigation::navigate),
        );

    let app = if state.prefix.is_empty() || state.prefix == "/" {
        api
    } else {
        Router::new().nest(&state.prefix, api)
    };

    app.layer(middleware::from_fn(handlers::request_context))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-powered-by"),
            HeaderValue::from_static(concat!("nldi ", env!("CARGO_PKG_VERSION"))),
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
