//! Handlers for the navigation endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde_json::json;

use super::json_body;
use crate::error::Result;
use crate::geojson::{linked_feature, navigated_flowline, FeatureCollection};
use crate::model::NavigationMode;
use crate::server::AppState;
use crate::services::{validate_request, AnchorResolver, NavigationParams, NavigationService};
use crate::util::url_join;

/// Index of navigation modes available from a feature.
#[utoipa::path(
    get,
    path = "/linked-data/{source}/{featureId}/navigation",
    params(
        ("source" = String, Path, description = "Source suffix"),
        ("featureId" = String, Path, description = "Provider-scoped feature identifier")
    ),
    responses(
        (status = 200, description = "Navigation mode links"),
        (status = 404, description = "Unknown source")
    ),
    tag = "navigation"
)]
pub async fn navigation_modes(
    State(state): State<AppState>,
    Path((source, identifier)): Path<(String, String)>,
) -> Result<Response> {
    let source = state.registry.get(&source).await?;
    let nav_url = url_join(
        &state.base_url,
        ["linked-data", &source.suffix, &identifier, "navigation"],
    );

    let mut content = json!({
        "upstreamMain": url_join(&nav_url, ["UM"]),
        "upstreamTributaries": url_join(&nav_url, ["UT"]),
        "downstreamMain": url_join(&nav_url, ["DM"]),
        "downstreamDiversions": url_join(&nav_url, ["DD"]),
    });
    // Point-to-point needs a COMID at both ends, so it is only offered
    // from flowline starts.
    if source.is_comid() {
        content["pointToPoint"] = json!(url_join(&nav_url, ["PP"]));
    }
    Ok(json_body(state.pretty, &content))
}

/// Index of data sources reachable from one navigation mode.
#[utoipa::path(
    get,
    path = "/linked-data/{source}/{featureId}/navigation/{mode}",
    params(
        ("source" = String, Path, description = "Source suffix"),
        ("featureId" = String, Path, description = "Provider-scoped feature identifier"),
        ("mode" = String, Path, description = "Navigation mode: UM, UT, DM, DD, or PP")
    ),
    responses(
        (status = 200, description = "Data source links for the mode"),
        (status = 400, description = "Unknown navigation mode"),
        (status = 404, description = "Unknown source")
    ),
    tag = "navigation"
)]
pub async fn navigation_info(
    State(state): State<AppState>,
    Path((source, identifier, mode)): Path<(String, String, String)>,
) -> Result<Response> {
    let mode: NavigationMode = mode.parse()?;
    let source = state.registry.get(&source).await?;
    let nav_url = url_join(
        &state.base_url,
        ["linked-data", &source.suffix, &identifier, "navigation"],
    );

    let mut content = vec![json!({
        "source": "Flowlines",
        "sourceName": "NHDPlus flowlines",
        "features": url_join(&nav_url, [mode.as_str(), "flowlines"]),
    })];
    for registered in state.registry.list().await {
        content.push(json!({
            "source": registered.suffix,
            "sourceName": registered.name,
            "features": url_join(&nav_url, [mode.as_str(), &registered.suffix]),
        }));
    }
    Ok(json_body(state.pretty, &content))
}

/// Execute a navigation and project it onto flowlines or a source's
/// features.
#[utoipa::path(
    get,
    path = "/linked-data/{source}/{featureId}/navigation/{mode}/{dataSource}",
    params(
        ("source" = String, Path, description = "Source suffix of the start feature"),
        ("featureId" = String, Path, description = "Provider-scoped feature identifier"),
        ("mode" = String, Path, description = "Navigation mode: UM, UT, DM, DD, or PP"),
        ("dataSource" = String, Path, description = "Either 'flowlines' or a source suffix"),
        NavigationParams
    ),
    responses(
        (status = 200, description = "Traversed flowlines or linked features", body = FeatureCollection),
        (status = 400, description = "Invalid navigation parameters"),
        (status = 404, description = "Unknown source, feature, or COMID")
    ),
    tag = "navigation"
)]
pub async fn navigate(
    State(state): State<AppState>,
    Path((source, identifier, mode, data_source)): Path<(String, String, String, String)>,
    Query(params): Query<NavigationParams>,
) -> Result<Response> {
    let request = validate_request(&mode, &params)?;

    // Resolve both ends of the join before any traversal work.
    let want_flowlines = data_source.eq_ignore_ascii_case("flowlines");
    let output_source = if want_flowlines {
        None
    } else {
        Some(state.registry.get(&data_source).await?)
    };
    let start_source = state.registry.get(&source).await?;

    let anchor = AnchorResolver::new(&state.db)
        .resolve(&start_source, &identifier)
        .await?;

    let service = NavigationService::new(state.db.clone());
    let nav = service.comids(&anchor, &request).await?;
    // An isolated anchor or unreachable stop COMID is an empty
    // collection, not an error.

    let collection = match output_source {
        None => {
            let trim = service
                .resolve_trim(&anchor, &request, &start_source, &identifier)
                .await?;
            let flowlines = service.flowlines(&nav, &request, trim).await?;
            FeatureCollection::new(flowlines.iter().map(navigated_flowline).collect())
        }
        Some(output_source) => {
            let features = service.features(&nav, &output_source).await?;
            FeatureCollection::new(
                features
                    .iter()
                    .map(|f| linked_feature(f, &output_source, &state.base_url))
                    .collect(),
            )
        }
    };
    Ok(json_body(state.pretty, &collection))
}
