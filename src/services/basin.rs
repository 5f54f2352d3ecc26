//! Upstream basin retrieval, including the split-catchment path.

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::geojson::{basin_feature, FeatureCollection, GeoFeature};
use crate::model::CrawlerSource;
use crate::pygeoapi::PyGeoApiClient;
use crate::repository::Db;
use crate::services::anchor::{parse_comid, AnchorResolver};

/// Computes basin polygons for a start feature.
pub struct BasinService<'a> {
    db: &'a Db,
    pygeoapi: &'a PyGeoApiClient,
}

impl<'a> BasinService<'a> {
    pub fn new(db: &'a Db, pygeoapi: &'a PyGeoApiClient) -> Self {
        Self { db, pygeoapi }
    }

    /// The basin upstream of a feature.
    ///
    /// With `split_catchment` and a point-located feature, the starting
    /// catchment is split at the hydro-located point by the remote
    /// geoprocessing service and its polygon is returned instead of the
    /// whole-catchment aggregate.
    pub async fn get_basin(
        &self,
        source: &CrawlerSource,
        identifier: &str,
        simplified: bool,
        split_catchment: bool,
    ) -> Result<FeatureCollection> {
        if source.is_comid() {
            let comid = parse_comid(identifier)?;
            self.db
                .flowlines()
                .get(comid)
                .await?
                .ok_or_else(|| Error::not_found(format!("COMID {comid} not found")))?;
            let geometry = self.db.basins().upstream_basin(comid, simplified).await?;
            return Ok(FeatureCollection::new(vec![basin_feature(geometry)]));
        }

        let feature = AnchorResolver::new(self.db)
            .feature(source, identifier)
            .await?;
        let comid = feature.comid.ok_or_else(|| {
            Error::not_found(format!(
                "The feature {identifier} from source '{}' is not indexed",
                source.suffix
            ))
        })?;

        if split_catchment {
            if let Some((lon, lat)) = point_coordinates(feature.geometry.as_ref()) {
                tracing::debug!(identifier, "Splitting catchment at hydro-located point");
                let (snap_lon, snap_lat) =
                    self.pygeoapi.flowtrace_intersection(lon, lat).await?;
                let split = self.pygeoapi.split_catchment(snap_lon, snap_lat).await?;
                return Ok(FeatureCollection::new(vec![split_to_feature(split)]));
            }
            tracing::debug!(
                identifier,
                "splitCatchment requested but the feature has no point location"
            );
        }

        let geometry = self.db.basins().upstream_basin(comid, simplified).await?;
        Ok(FeatureCollection::new(vec![basin_feature(geometry)]))
    }
}

/// Coordinates of a point geometry, if that is what this is.
fn point_coordinates(geometry: Option<&Value>) -> Option<(f64, f64)> {
    let geometry = geometry?;
    if geometry.get("type")?.as_str()? != "Point" {
        return None;
    }
    let coords = geometry.get("coordinates")?.as_array()?;
    Some((coords.first()?.as_f64()?, coords.get(1)?.as_f64()?))
}

/// Re-shape the remote split-catchment feature for the wire.
fn split_to_feature(split: Value) -> GeoFeature {
    GeoFeature::new(
        split.get("geometry").cloned(),
        split.get("properties").cloned().unwrap_or_else(|| json!({})),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_coordinates() {
        let point = json!({"type": "Point", "coordinates": [-89.5, 43.0]});
        assert_eq!(point_coordinates(Some(&point)), Some((-89.5, 43.0)));

        let line = json!({"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]});
        assert_eq!(point_coordinates(Some(&line)), None);
        assert_eq!(point_coordinates(None), None);
        assert_eq!(point_coordinates(Some(&json!({"type": "Point"}))), None);
    }

    #[test]
    fn test_split_to_feature_keeps_geometry_and_properties() {
        let split = json!({
            "type": "Feature",
            "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]]]},
            "properties": {"catchmentID": "13297198"}
        });
        let feature = split_to_feature(split);
        assert_eq!(feature.geometry.as_ref().unwrap()["type"], "Polygon");
        assert_eq!(feature.properties["catchmentID"], "13297198");
    }
}
