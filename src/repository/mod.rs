//! Read-only query layer over the NLDI PostgreSQL database.
//!
//! One repository per table family, each owning a narrow semantic API
//! and returning domain records. All access goes through diesel-async
//! with raw parameterised SQL; the PostGIS calls and the navigation
//! set-returning function are not expressible in the diesel DSL.

pub mod basin;
pub mod catchment;
pub mod feature;
pub mod flowline;
pub mod mainstem;
pub mod navigate;
pub mod pool;
pub mod source;

pub use basin::BasinRepository;
pub use catchment::CatchmentRepository;
pub use feature::FeatureRepository;
pub use flowline::{FlowlineRepository, FlowlineTrim};
pub use mainstem::MainstemRepository;
pub use navigate::NavigationDao;
pub use pool::Db;
pub use source::CrawlerSourceRepository;

/// Parse the GeoJSON text PostGIS emitted for a geometry column.
///
/// A NULL geometry stays `None`; malformed output from `ST_AsGeoJSON`
/// would be a database defect and surfaces as a geometry error.
pub(crate) fn parse_geojson(
    raw: Option<String>,
) -> crate::error::Result<Option<serde_json::Value>> {
    match raw {
        None => Ok(None),
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| crate::error::Error::Geometry(format!("unparseable geometry: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_geojson() {
        assert_eq!(parse_geojson(None).unwrap(), None);
        let value = parse_geojson(Some(r#"{"type":"Point","coordinates":[-89.5,43.0]}"#.into()))
            .unwrap()
            .unwrap();
        assert_eq!(value["type"], "Point");
        assert!(parse_geojson(Some("not json".into())).is_err());
    }
}
