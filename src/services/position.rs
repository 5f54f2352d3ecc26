//! Coordinate-based lookups: containing catchment and hydrolocation.

use serde_json::json;

use crate::error::{Error, Result};
use crate::geojson::{
    hydrolocation_feature, navigation_url, provided_point_feature, FeatureCollection, GeoFeature,
};
use crate::model::{Anchor, AnchorOrigin, Catchment};
use crate::pygeoapi::PyGeoApiClient;
use crate::repository::Db;
use crate::util::{parse_point, point_wkt};

/// The catchment containing a `POINT(lon lat)` coordinate string.
pub async fn catchment_at(db: &Db, coords: &str) -> Result<Catchment> {
    let (lon, lat) = parse_point(coords)?;
    db.catchments()
        .containing_point(&point_wkt(lon, lat))
        .await?
        .ok_or_else(|| Error::not_found(format!("No catchment found at {coords}")))
}

/// Resolve a coordinate start precisely: the point is projected onto the
/// flowline network, the split-catchment polygon replaces the whole
/// catchment, and the anchor carries the computed measure.
pub async fn split_catchment_at(
    db: &Db,
    pygeoapi: &PyGeoApiClient,
    base_url: &str,
    coords: &str,
) -> Result<FeatureCollection> {
    let (lon, lat) = parse_point(coords)?;
    let (snap_lon, snap_lat) = pygeoapi.flowtrace_intersection(lon, lat).await?;

    let snapped_wkt = point_wkt(snap_lon, snap_lat);
    let catchment = db
        .catchments()
        .containing_point(&snapped_wkt)
        .await?
        .ok_or_else(|| Error::not_found(format!("No catchment found at {coords}")))?;

    let measure = db
        .flowlines()
        .measure_at_point(catchment.comid, &snapped_wkt)
        .await?
        .map(|(measure, _)| measure);

    let split = pygeoapi.split_catchment(snap_lon, snap_lat).await?;
    let mainstem = db.mainstems().get(catchment.comid).await?;
    let anchor = Anchor {
        comid: catchment.comid,
        measure,
        origin: AnchorOrigin::Coordinates { lon, lat },
        trim_geometry: split.get("geometry").cloned(),
    };

    let comid = anchor.comid.to_string();
    let properties = json!({
        "identifier": serde_json::Value::Null,
        "source": "comid",
        "sourceName": "NHDPlus comid",
        "comid": comid,
        "measure": anchor.measure,
        "mainstem": mainstem,
        "navigation": navigation_url(base_url, "comid", &comid),
    });
    Ok(FeatureCollection::new(vec![GeoFeature::new(
        anchor.trim_geometry,
        properties,
    )]))
}

/// Compute the point on the flowline network for a coordinate pair.
///
/// The flowtrace process projects the point onto the network; the
/// containing catchment supplies the COMID, and the measure falls out of
/// `ST_LineLocatePoint` against that flowline. The response pairs the
/// computed hydrolocation with an echo of the caller's point.
pub async fn hydrolocation(
    db: &Db,
    pygeoapi: &PyGeoApiClient,
    base_url: &str,
    coords: &str,
) -> Result<FeatureCollection> {
    let (lon, lat) = parse_point(coords)?;
    let (snap_lon, snap_lat) = pygeoapi.flowtrace_intersection(lon, lat).await?;
    tracing::debug!(snap_lon, snap_lat, "Flowtrace intersection point");

    let snapped_wkt = point_wkt(snap_lon, snap_lat);
    let catchment = db
        .catchments()
        .containing_point(&snapped_wkt)
        .await?
        .ok_or_else(|| Error::not_found(format!("No COMID found at {coords}")))?;

    let (measure, reachcode) = db
        .flowlines()
        .measure_at_point(catchment.comid, &snapped_wkt)
        .await?
        .ok_or_else(|| Error::not_found(format!("No measure found at {coords}")))?;

    Ok(FeatureCollection::new(vec![
        hydrolocation_feature(snap_lon, snap_lat, catchment.comid, measure, reachcode, base_url),
        provided_point_feature(lon, lat),
    ]))
}
