//! Handlers for feature and flowline lookups under `/linked-data`.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use super::json_body;
use crate::error::{Error, Result};
use crate::geojson::{catchment_feature, comid_flowline, linked_feature, FeatureCollection};
use crate::server::AppState;
use crate::services::anchor::parse_comid;
use crate::services::{position, AnchorResolver, BasinService};
use crate::util::url_join;

/// Largest accepted page size for feature listings.
const MAX_LIMIT: i64 = 10_000;
const DEFAULT_LIMIT: i64 = 100;

/// List registered sources plus the synthetic comid source.
#[utoipa::path(
    get,
    path = "/linked-data",
    responses((status = 200, description = "Registered crawler sources")),
    tag = "linked-data"
)]
pub async fn list_sources(State(state): State<AppState>) -> Response {
    let base = &state.base_url;
    let mut content = vec![json!({
        "source": "comid",
        "sourceName": "NHDPlus comid",
        "features": url_join(base, ["linked-data", "comid", "position"]),
    })];
    for source in state.registry.list().await {
        content.push(json!({
            "source": source.suffix,
            "sourceName": source.name,
            "features": url_join(base, ["linked-data", &source.suffix]),
        }));
    }
    json_body(state.pretty, &content)
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// Page size, 1 to 10000, default 100.
    pub limit: Option<String>,
    /// Rows to skip, default 0.
    pub offset: Option<String>,
}

fn parse_paging(params: &PageParams) -> Result<(i64, i64)> {
    let limit = match params.limit.as_deref() {
        None => DEFAULT_LIMIT,
        Some(raw) => {
            let limit: i64 = raw
                .trim()
                .parse()
                .map_err(|_| Error::invalid("Invalid limit provided"))?;
            if !(1..=MAX_LIMIT).contains(&limit) {
                return Err(Error::invalid(format!("limit must be in [1, {MAX_LIMIT}]")));
            }
            limit
        }
    };
    let offset = match params.offset.as_deref() {
        None => 0,
        Some(raw) => {
            let offset: i64 = raw
                .trim()
                .parse()
                .map_err(|_| Error::invalid("Invalid offset provided"))?;
            if offset < 0 {
                return Err(Error::invalid("offset must not be negative"));
            }
            offset
        }
    };
    Ok((limit, offset))
}

/// List the features of one source, paged.
#[utoipa::path(
    get,
    path = "/linked-data/{source}",
    params(("source" = String, Path, description = "Source suffix"), PageParams),
    responses(
        (status = 200, description = "Features of the source", body = FeatureCollection),
        (status = 404, description = "Unknown source")
    ),
    tag = "linked-data"
)]
pub async fn list_features(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Response> {
    let (limit, offset) = parse_paging(&params)?;
    let source = state.registry.get(&source).await?;
    if source.is_comid() {
        return Err(Error::invalid(
            "The comid source cannot be listed; look up flowlines by COMID instead",
        ));
    }
    let features = state.db.features().list(source.source_id, limit, offset).await?;
    let shaped = features
        .iter()
        .map(|f| linked_feature(f, &source, &state.base_url))
        .collect();
    Ok(json_body(state.pretty, &FeatureCollection::new(shaped)))
}

/// One feature by source and identifier.
#[utoipa::path(
    get,
    path = "/linked-data/{source}/{featureId}",
    params(
        ("source" = String, Path, description = "Source suffix"),
        ("featureId" = String, Path, description = "Provider-scoped feature identifier")
    ),
    responses(
        (status = 200, description = "The feature", body = FeatureCollection),
        (status = 404, description = "Unknown source or feature")
    ),
    tag = "linked-data"
)]
pub async fn feature_by_id(
    State(state): State<AppState>,
    Path((source, identifier)): Path<(String, String)>,
) -> Result<Response> {
    // A case-folded `comid` lands here rather than on the dedicated
    // route; treat it the same.
    if source.eq_ignore_ascii_case("comid") {
        return flowline_response(&state, &identifier).await;
    }
    let source = state.registry.get(&source).await?;
    let feature = AnchorResolver::new(&state.db)
        .feature(&source, &identifier)
        .await?;
    let shaped = linked_feature(&feature, &source, &state.base_url);
    Ok(json_body(state.pretty, &FeatureCollection::new(vec![shaped])))
}

async fn flowline_response(state: &AppState, identifier: &str) -> Result<Response> {
    let comid = parse_comid(identifier)?;
    let flowline = state
        .db
        .flowlines()
        .get(comid)
        .await?
        .ok_or_else(|| Error::not_found(format!("COMID {comid} not found")))?;
    let shaped = comid_flowline(&flowline, &state.base_url);
    Ok(json_body(
        state.pretty,
        &FeatureCollection::new(vec![shaped]),
    ))
}

/// One flowline by COMID.
#[utoipa::path(
    get,
    path = "/linked-data/comid/{comid}",
    params(("comid" = i64, Path, description = "NHDPlus COMID")),
    responses(
        (status = 200, description = "The flowline", body = FeatureCollection),
        (status = 404, description = "COMID not found")
    ),
    tag = "linked-data"
)]
pub async fn comid_by_id(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Response> {
    flowline_response(&state, &identifier).await
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CoordsParam {
    /// Coordinates as `POINT(lon lat)`, WGS84.
    pub coords: Option<String>,
    /// Resolve the position precisely through the split-catchment
    /// service instead of returning the whole containing catchment.
    #[serde(rename = "splitCatchment")]
    pub split_catchment: Option<String>,
}

fn require_coords(params: &CoordsParam) -> Result<&str> {
    params
        .coords
        .as_deref()
        .ok_or_else(|| Error::invalid("Required parameter 'coords' is not present"))
}

/// The catchment containing a point.
#[utoipa::path(
    get,
    path = "/linked-data/comid/position",
    params(CoordsParam),
    responses(
        (status = 200, description = "Containing catchment", body = FeatureCollection),
        (status = 400, description = "Malformed coordinates"),
        (status = 404, description = "No catchment at the point")
    ),
    tag = "linked-data"
)]
pub async fn comid_by_position(
    State(state): State<AppState>,
    Query(params): Query<CoordsParam>,
) -> Result<Response> {
    let split = parse_basin_flag(params.split_catchment.as_deref(), "splitCatchment", false)?;
    let coords = require_coords(&params)?;
    if split {
        let collection =
            position::split_catchment_at(&state.db, &state.pygeoapi, &state.base_url, coords)
                .await?;
        return Ok(json_body(state.pretty, &collection));
    }
    let catchment = position::catchment_at(&state.db, coords).await?;
    let shaped = catchment_feature(&catchment, &state.base_url);
    Ok(json_body(
        state.pretty,
        &FeatureCollection::new(vec![shaped]),
    ))
}

/// The hydrologic location of a point on the flowline network.
#[utoipa::path(
    get,
    path = "/linked-data/hydrolocation",
    params(CoordsParam),
    responses(
        (status = 200, description = "Computed hydrolocation and the provided point", body = FeatureCollection),
        (status = 400, description = "Malformed coordinates")
    ),
    tag = "linked-data"
)]
pub async fn hydrolocation(
    State(state): State<AppState>,
    Query(params): Query<CoordsParam>,
) -> Result<Response> {
    let coords = require_coords(&params)?;
    let collection =
        position::hydrolocation(&state.db, &state.pygeoapi, &state.base_url, coords).await?;
    Ok(json_body(state.pretty, &collection))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BasinParams {
    /// Simplify the basin polygon; defaults to true.
    pub simplified: Option<String>,
    /// Split the starting catchment at the feature's hydrolocation.
    #[serde(rename = "splitCatchment")]
    pub split_catchment: Option<String>,
}

fn parse_basin_flag(raw: Option<&str>, name: &str, default: bool) -> Result<bool> {
    match raw {
        None => Ok(default),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(Error::invalid(format!("Invalid {name} provided"))),
        },
    }
}

/// The basin upstream of a feature.
#[utoipa::path(
    get,
    path = "/linked-data/{source}/{featureId}/basin",
    params(
        ("source" = String, Path, description = "Source suffix"),
        ("featureId" = String, Path, description = "Provider-scoped feature identifier"),
        BasinParams
    ),
    responses(
        (status = 200, description = "Upstream basin polygon", body = FeatureCollection),
        (status = 404, description = "Unknown source or feature")
    ),
    tag = "linked-data"
)]
pub async fn basin(
    State(state): State<AppState>,
    Path((source, identifier)): Path<(String, String)>,
    Query(params): Query<BasinParams>,
) -> Result<Response> {
    let simplified = parse_basin_flag(params.simplified.as_deref(), "simplified", true)?;
    let split = parse_basin_flag(params.split_catchment.as_deref(), "splitCatchment", false)?;
    let source = state.registry.get(&source).await?;
    let collection = BasinService::new(&state.db, &state.pygeoapi)
        .get_basin(&source, &identifier, simplified, split)
        .await?;
    Ok(json_body(state.pretty, &collection))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(limit: Option<&str>, offset: Option<&str>) -> PageParams {
        PageParams {
            limit: limit.map(String::from),
            offset: offset.map(String::from),
        }
    }

    #[test]
    fn test_paging_defaults() {
        assert_eq!(parse_paging(&page(None, None)).unwrap(), (100, 0));
    }

    #[test]
    fn test_paging_bounds() {
        assert_eq!(parse_paging(&page(Some("1"), Some("30"))).unwrap(), (1, 30));
        assert_eq!(parse_paging(&page(Some("10000"), None)).unwrap(), (10_000, 0));
        assert!(parse_paging(&page(Some("0"), None)).is_err());
        assert!(parse_paging(&page(Some("10001"), None)).is_err());
        assert!(parse_paging(&page(Some("-3"), None)).is_err());
        assert!(parse_paging(&page(Some("ten"), None)).is_err());
        assert!(parse_paging(&page(None, Some("-1"))).is_err());
    }

    #[test]
    fn test_basin_flag_defaults() {
        assert!(parse_basin_flag(None, "simplified", true).unwrap());
        assert!(!parse_basin_flag(None, "splitCatchment", false).unwrap());
        assert!(!parse_basin_flag(Some("FALSE"), "simplified", true).unwrap());
        assert!(parse_basin_flag(Some("maybe"), "simplified", true).is_err());
    }
}
