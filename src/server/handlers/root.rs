//! Landing page and OpenAPI document.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use utoipa::OpenApi;

use super::{json_body, linked_data, navigation};
use crate::geojson::{FeatureCollection, GeoFeature};
use crate::server::AppState;
use crate::util::url_join;

#[derive(OpenApi)]
#[openapi(
    paths(
        linked_data::list_sources,
        linked_data::list_features,
        linked_data::feature_by_id,
        linked_data::comid_by_id,
        linked_data::comid_by_position,
        linked_data::hydrolocation,
        linked_data::basin,
        navigation::navigation_modes,
        navigation::navigation_info,
        navigation::navigate,
    ),
    components(schemas(FeatureCollection, GeoFeature)),
    tags(
        (name = "linked-data", description = "Lookup of indexed features and flowlines"),
        (name = "navigation", description = "Traversal of the NHDPlus flowline network")
    )
)]
struct ApiDoc;

/// Service landing document with links into the API.
pub async fn landing(State(state): State<AppState>) -> Response {
    let base = &state.base_url;
    let content = json!({
        "title": state.metadata.title,
        "description": state.metadata.description,
        "links": [
            {
                "rel": "data",
                "type": "application/json",
                "title": "Sources",
                "href": url_join(base, ["linked-data"]),
            },
            {
                "rel": "service-desc",
                "type": "text/html",
                "title": "The OpenAPI definition as HTML",
                "href": format!("{base}/openapi?f=html"),
            },
            {
                "rel": "service-desc",
                "type": "application/vnd.oai.openapi+json;version=3.0",
                "title": "The OpenAPI definition as JSON",
                "href": format!("{base}/openapi?f=json"),
            },
        ],
    });
    json_body(state.pretty, &content)
}

#[derive(Debug, Deserialize)]
pub struct FormatParam {
    pub f: Option<String>,
}

/// Build the OpenAPI document with the configured metadata applied.
pub fn openapi_document(metadata: &crate::config::Metadata) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = metadata.title.clone();
    doc.info.description = Some(metadata.description.clone());
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.license = Some(utoipa::openapi::License::new(metadata.license.clone()));
    if !metadata.contact.is_empty() {
        doc.info.contact = Some(
            utoipa::openapi::info::ContactBuilder::new()
                .name(Some(metadata.contact.clone()))
                .build(),
        );
    }
    doc
}

/// Serve the OpenAPI document as JSON, YAML, or an HTML viewer.
pub async fn openapi(
    State(state): State<AppState>,
    Query(params): Query<FormatParam>,
) -> Response {
    let doc = openapi_document(&state.metadata);
    match params.f.as_deref().unwrap_or("json") {
        "json" => match doc.to_json() {
            Ok(body) => (
                [(header::CONTENT_TYPE, "application/vnd.oai.openapi+json;version=3.0")],
                body,
            )
                .into_response(),
            Err(err) => crate::error::Error::Internal(err.to_string()).into_response(),
        },
        "yaml" => match doc.to_yaml() {
            Ok(body) => ([(header::CONTENT_TYPE, "application/x-yaml")], body).into_response(),
            Err(err) => crate::error::Error::Internal(err.to_string()).into_response(),
        },
        "html" => Html(swagger_page(&state.base_url, &state.metadata.title)).into_response(),
        other => (
            StatusCode::NOT_ACCEPTABLE,
            Json(json!({
                "code": "NotAcceptable",
                "message": format!("Unsupported format '{other}'; use f=json, f=yaml, or f=html"),
            })),
        )
            .into_response(),
    }
}

fn swagger_page(base_url: &str, title: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html>
<head>
  <title>{title}</title>
  <meta charset="utf-8"/>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css"/>
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    SwaggerUIBundle({{ url: "{base_url}/openapi?f=json", dom_id: "#swagger-ui" }});
  </script>
</body>
</html>
"##
    )
}
