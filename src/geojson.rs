//! GeoJSON response shaping.
//!
//! Everything the service emits is a FeatureCollection. Geometry arrives
//! from PostGIS already encoded as GeoJSON; this module attaches the
//! property projection and the navigation HATEOAS links.

use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::model::{Catchment, CrawlerSource, Feature, Flowline};
use crate::util::url_join;

/// A GeoJSON feature collection.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    #[schema(example = "FeatureCollection")]
    pub kind: &'static str,
    pub features: Vec<GeoFeature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<GeoFeature>) -> Self {
        FeatureCollection {
            kind: "FeatureCollection",
            features,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// A single GeoJSON feature with projected properties.
#[derive(Debug, Serialize, ToSchema)]
pub struct GeoFeature {
    #[serde(rename = "type")]
    #[schema(example = "Feature")]
    pub kind: &'static str,
    /// Geometry as emitted by the database; absent geometry is `null`.
    #[schema(value_type = Object, nullable)]
    pub geometry: Option<Value>,
    #[schema(value_type = Object)]
    pub properties: Value,
}

impl GeoFeature {
    pub fn new(geometry: Option<Value>, properties: Value) -> Self {
        GeoFeature {
            kind: "Feature",
            geometry,
            properties,
        }
    }
}

/// Property projection for features of a registered crawler source.
/// Missing database values serialise as JSON `null`.
#[derive(Debug, Serialize)]
pub struct LinkedFeatureProperties {
    pub identifier: Option<String>,
    pub name: Option<String>,
    pub source: Option<String>,
    #[serde(rename = "sourceName")]
    pub source_name: Option<String>,
    pub comid: Option<String>,
    #[serde(rename = "type")]
    pub feature_type: Option<String>,
    pub uri: Option<String>,
    pub reachcode: Option<String>,
    pub measure: Option<f64>,
    pub navigation: String,
    pub mainstem: Option<String>,
}

/// The navigation endpoint URL for a feature of a source.
pub fn navigation_url(base_url: &str, source_suffix: &str, identifier: &str) -> String {
    url_join(base_url, ["linked-data", source_suffix, identifier, "navigation"])
}

/// Shape a crawled feature for the wire.
pub fn linked_feature(feature: &Feature, source: &CrawlerSource, base_url: &str) -> GeoFeature {
    let properties = LinkedFeatureProperties {
        identifier: Some(feature.identifier.clone()),
        name: feature.name.clone(),
        source: Some(source.suffix.clone()),
        source_name: Some(source.name.clone()),
        comid: feature.comid.map(|c| c.to_string()),
        feature_type: source.feature_type.clone(),
        uri: feature.uri.clone(),
        reachcode: feature.reachcode.clone(),
        measure: feature.measure,
        navigation: navigation_url(base_url, &source.suffix, &feature.identifier),
        mainstem: feature.mainstem.clone(),
    };
    // LinkedFeatureProperties contains nothing a serialiser can reject.
    GeoFeature::new(
        feature.geometry.clone(),
        serde_json::to_value(properties).unwrap_or(Value::Null),
    )
}

/// Shape a flowline looked up by COMID (`/linked-data/comid/{comid}`).
pub fn comid_flowline(flowline: &Flowline, base_url: &str) -> GeoFeature {
    let comid = flowline.comid.to_string();
    let properties = json!({
        "identifier": flowline.permanent_identifier,
        "source": "comid",
        "sourceName": "NHDPlus comid",
        "comid": comid,
        "reachcode": flowline.reachcode,
        "mainstem": flowline.mainstem,
        "navigation": navigation_url(base_url, "comid", &comid),
    });
    GeoFeature::new(flowline.geometry.clone(), properties)
}

/// Shape a flowline inside a navigation result. These carry the minimal
/// property set keyed by `nhdplus_comid`.
pub fn navigated_flowline(flowline: &Flowline) -> GeoFeature {
    let properties = json!({ "nhdplus_comid": flowline.comid.to_string() });
    GeoFeature::new(flowline.geometry.clone(), properties)
}

/// Shape the catchment polygon answering a position lookup.
pub fn catchment_feature(catchment: &Catchment, base_url: &str) -> GeoFeature {
    let comid = catchment.comid.to_string();
    let properties = json!({
        "identifier": Value::Null,
        "source": "comid",
        "sourceName": "NHDPlus comid",
        "comid": comid,
        "navigation": navigation_url(base_url, "comid", &comid),
    });
    GeoFeature::new(catchment.geometry.clone(), properties)
}

/// Shape a basin polygon; basins carry no properties of their own.
pub fn basin_feature(geometry: Value) -> GeoFeature {
    GeoFeature::new(Some(geometry), json!({}))
}

/// The computed point-on-flowline feature of a hydrolocation response.
pub fn hydrolocation_feature(
    lon: f64,
    lat: f64,
    comid: i64,
    measure: f64,
    reachcode: Option<String>,
    base_url: &str,
) -> GeoFeature {
    let comid = comid.to_string();
    let properties = json!({
        "identifier": "",
        "navigation": navigation_url(base_url, "comid", &comid),
        "measure": measure,
        "reachcode": reachcode,
        "name": "",
        "source": "indexed",
        "sourceName": "Automatically indexed by the NLDI",
        "comid": comid,
        "type": "hydrolocation",
        "uri": "",
    });
    GeoFeature::new(
        Some(json!({ "type": "Point", "coordinates": [lon, lat] })),
        properties,
    )
}

/// The echo of the caller-provided point in a hydrolocation response.
pub fn provided_point_feature(lon: f64, lat: f64) -> GeoFeature {
    let properties = json!({
        "identifier": "",
        "navigation": "",
        "measure": "",
        "reachcode": "",
        "name": "",
        "source": "provided",
        "sourceName": "Provided via API call",
        "comid": "",
        "type": "point",
        "uri": "",
    });
    GeoFeature::new(
        Some(json!({ "type": "Point", "coordinates": [lon, lat] })),
        properties,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnMapping, IngestType};

    const BASE: &str = "https://labs.waterdata.usgs.gov/api/nldi";

    fn wqp_source() -> CrawlerSource {
        CrawlerSource {
            source_id: 1,
            suffix: "wqp".to_string(),
            name: "Water Quality Portal".to_string(),
            uri: "https://www.waterqualitydata.us".to_string(),
            columns: ColumnMapping {
                feature_id: "MonitoringLocationIdentifier".to_string(),
                feature_name: "MonitoringLocationName".to_string(),
                feature_uri: "siteUrl".to_string(),
                feature_reach: None,
                feature_measure: None,
            },
            ingest_type: IngestType::Point,
            feature_type: Some("varies".to_string()),
        }
    }

    #[test]
    fn test_linked_feature_projection() {
        let feature = Feature {
            source_id: 1,
            identifier: "USGS-05428500".to_string(),
            name: Some("Yahara River".to_string()),
            uri: None,
            comid: Some(13_297_198),
            reachcode: None,
            measure: None,
            mainstem: Some("https://geoconnex.us/ref/mainstems/123".to_string()),
            geometry: Some(json!({"type": "Point", "coordinates": [-89.36, 43.08]})),
        };

        let shaped = linked_feature(&feature, &wqp_source(), BASE);
        let props = &shaped.properties;

        // The COMID travels as a string for wire stability.
        assert_eq!(props["comid"], "13297198");
        assert_eq!(props["source"], "wqp");
        assert_eq!(props["sourceName"], "Water Quality Portal");
        // Missing database values are JSON null, never the string "null".
        assert_eq!(props["uri"], Value::Null);
        assert_eq!(props["reachcode"], Value::Null);
        assert_eq!(props["measure"], Value::Null);
        assert_eq!(
            props["navigation"],
            format!("{BASE}/linked-data/wqp/USGS-05428500/navigation")
        );
    }

    #[test]
    fn test_comid_flowline_projection() {
        let flowline = Flowline {
            comid: 13_297_198,
            permanent_identifier: Some("13297198".to_string()),
            reachcode: Some("07090002007373".to_string()),
            fmeasure: Some(0.0),
            tmeasure: Some(100.0),
            lengthkm: Some(2.2),
            mainstem: None,
            geometry: Some(json!({"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]})),
        };

        let shaped = comid_flowline(&flowline, BASE);
        assert_eq!(shaped.properties["comid"], "13297198");
        assert_eq!(shaped.properties["source"], "comid");
        assert_eq!(shaped.properties["sourceName"], "NHDPlus comid");
        assert_eq!(shaped.properties["mainstem"], Value::Null);
        assert_eq!(shaped.geometry.as_ref().unwrap()["type"], "LineString");
    }

    #[test]
    fn test_navigated_flowline_carries_nhdplus_comid() {
        let flowline = Flowline {
            comid: 42,
            permanent_identifier: None,
            reachcode: None,
            fmeasure: None,
            tmeasure: None,
            lengthkm: None,
            mainstem: None,
            geometry: None,
        };
        let shaped = navigated_flowline(&flowline);
        assert_eq!(shaped.properties["nhdplus_comid"], "42");
        assert_eq!(shaped.geometry, None);
    }

    #[test]
    fn test_empty_collection_serialises_to_empty_features() {
        let collection = FeatureCollection::empty();
        let json = serde_json::to_value(&collection).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"], json!([]));
    }

    #[test]
    fn test_hydrolocation_pair_shapes() {
        let computed =
            hydrolocation_feature(-89.51, 43.09, 13_297_198, 42.5, Some("0709".to_string()), BASE);
        assert_eq!(computed.properties["source"], "indexed");
        assert_eq!(computed.properties["type"], "hydrolocation");
        assert_eq!(computed.properties["measure"], 42.5);

        let provided = provided_point_feature(-89.509, 43.087);
        assert_eq!(provided.properties["source"], "provided");
        assert_eq!(provided.properties["comid"], "");
        assert_eq!(
            provided.geometry.as_ref().unwrap()["coordinates"],
            json!([-89.509, 43.087])
        );
    }
}
