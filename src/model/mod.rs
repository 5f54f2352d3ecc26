//! Domain records for the hydrography and crawler tables.
//!
//! These are plain data types; row structs and SQL live in the
//! repository layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Reserved source id of the synthetic `comid` source, whose "features"
/// are NHDPlus flowlines.
pub const COMID_SOURCE_ID: i32 = 0;

/// Suffix of the synthetic flowline source.
pub const COMID_SOURCE_SUFFIX: &str = "comid";

/// How a crawler source anchors its features to the flowline network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestType {
    /// Snapped to a catchment COMID by point location.
    Point,
    /// Positioned along a flowline by (reachcode, measure).
    Reach,
}

impl IngestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestType::Point => "point",
            IngestType::Reach => "reach",
        }
    }
}

impl FromStr for IngestType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "point" => Ok(IngestType::Point),
            "reach" => Ok(IngestType::Reach),
            other => Err(Error::Configuration(format!("unknown ingest_type '{other}'"))),
        }
    }
}

/// Attribute-name mapping for a crawler source: which columns of the
/// upstream feed carry the identifier, name, and URI (plus reach and
/// measure for reach-indexed sources).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub feature_id: String,
    pub feature_name: String,
    pub feature_uri: String,
    pub feature_reach: Option<String>,
    pub feature_measure: Option<String>,
}

impl ColumnMapping {
    /// Column names come from operator configuration and end up stored in
    /// the crawler_source table. Only plain identifiers are admitted.
    pub fn validate(&self) -> Result<(), Error> {
        for name in [Some(&self.feature_id), Some(&self.feature_name), Some(&self.feature_uri), self.feature_reach.as_ref(), self.feature_measure.as_ref()]
            .into_iter()
            .flatten()
        {
            if name.is_empty()
                || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(Error::Configuration(format!(
                    "invalid attribute column name '{name}'"
                )));
            }
        }
        Ok(())
    }
}

/// One row of `nldi_data.crawler_source`: an external dataset the NLDI
/// can report on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlerSource {
    pub source_id: i32,
    /// URL suffix, unique after case folding.
    pub suffix: String,
    pub name: String,
    pub uri: String,
    pub columns: ColumnMapping,
    pub ingest_type: IngestType,
    pub feature_type: Option<String>,
}

impl CrawlerSource {
    /// The synthetic built-in source backing `/linked-data/comid/...`.
    pub fn comid() -> Self {
        CrawlerSource {
            source_id: COMID_SOURCE_ID,
            suffix: COMID_SOURCE_SUFFIX.to_string(),
            name: "NHDPlus comid".to_string(),
            uri: String::new(),
            columns: ColumnMapping {
                feature_id: "comid".to_string(),
                feature_name: "comid".to_string(),
                feature_uri: "comid".to_string(),
                feature_reach: None,
                feature_measure: None,
            },
            ingest_type: IngestType::Point,
            feature_type: Some("hydrolocation".to_string()),
        }
    }

    pub fn is_comid(&self) -> bool {
        self.source_id == COMID_SOURCE_ID
    }
}

/// A crawled feature from `nldi_data.feature`, joined with its mainstem
/// annotation where one exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub source_id: i32,
    pub identifier: String,
    pub name: Option<String>,
    pub uri: Option<String>,
    /// COMID of the catchment/flowline this feature is indexed against.
    pub comid: Option<i64>,
    pub reachcode: Option<String>,
    pub measure: Option<f64>,
    pub mainstem: Option<String>,
    /// Geometry as emitted by `ST_AsGeoJSON`.
    pub geometry: Option<serde_json::Value>,
}

/// An NHDPlus flowline reach.
#[derive(Debug, Clone, PartialEq)]
pub struct Flowline {
    pub comid: i64,
    pub permanent_identifier: Option<String>,
    pub reachcode: Option<String>,
    pub fmeasure: Option<f64>,
    pub tmeasure: Option<f64>,
    pub lengthkm: Option<f64>,
    pub mainstem: Option<String>,
    pub geometry: Option<serde_json::Value>,
}

/// A catchment polygon from `nhdplus.catchmentsp`.
#[derive(Debug, Clone, PartialEq)]
pub struct Catchment {
    /// `featureid`, equal to the COMID of the flowline it drains to.
    pub comid: i64,
    pub geometry: Option<serde_json::Value>,
}

/// Where a request's starting point came from.
#[derive(Debug, Clone, PartialEq)]
pub enum AnchorOrigin {
    /// `/linked-data/comid/{comid}`.
    Comid,
    /// A feature of a registered crawler source.
    Feature { source_suffix: String },
    /// A raw coordinate pair resolved through the catchment table.
    Coordinates { lon: f64, lat: f64 },
}

/// Resolved starting point of a navigation: a COMID plus an optional
/// fractional measure along its reach. Lives for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub comid: i64,
    /// Measure along the reach in [0, 100], when known.
    pub measure: Option<f64>,
    pub origin: AnchorOrigin,
    /// Replacement geometry for the starting catchment, supplied by the
    /// split-catchment service.
    pub trim_geometry: Option<serde_json::Value>,
}

impl Anchor {
    pub fn for_comid(comid: i64) -> Self {
        Anchor {
            comid,
            measure: None,
            origin: AnchorOrigin::Comid,
            trim_geometry: None,
        }
    }
}

/// Navigation mode accepted on `/navigation/{mode}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationMode {
    /// Upstream main.
    UM,
    /// Upstream with tributaries.
    UT,
    /// Downstream main.
    DM,
    /// Downstream with diversions.
    DD,
    /// Point-to-point between two COMIDs; requires `stopComid`.
    PP,
}

impl NavigationMode {
    pub const ALL: [NavigationMode; 5] = [
        NavigationMode::UM,
        NavigationMode::UT,
        NavigationMode::DM,
        NavigationMode::DD,
        NavigationMode::PP,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationMode::UM => "UM",
            NavigationMode::UT => "UT",
            NavigationMode::DM => "DM",
            NavigationMode::DD => "DD",
            NavigationMode::PP => "PP",
        }
    }

    /// Whether the traversal moves downstream; decides which end of the
    /// starting flowline survives a trim.
    pub fn is_downstream(&self) -> bool {
        matches!(self, NavigationMode::DM | NavigationMode::DD | NavigationMode::PP)
    }

    /// Only DM and PP traversals accept a stop COMID.
    pub fn accepts_stop(&self) -> bool {
        matches!(self, NavigationMode::DM | NavigationMode::PP)
    }
}

impl fmt::Display for NavigationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NavigationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UM" => Ok(NavigationMode::UM),
            "UT" => Ok(NavigationMode::UT),
            "DM" => Ok(NavigationMode::DM),
            "DD" => Ok(NavigationMode::DD),
            "PP" => Ok(NavigationMode::PP),
            other => Err(Error::invalid(format!("Unknown navigation mode '{other}'"))),
        }
    }
}

/// Ordered COMID set produced by the navigation function.
///
/// The database ordering is preserved; duplicates keep their first
/// occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavResult {
    comids: Vec<i64>,
}

impl NavResult {
    pub fn from_ordered(raw: impl IntoIterator<Item = i64>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let comids = raw.into_iter().filter(|c| seen.insert(*c)).collect();
        NavResult { comids }
    }

    pub fn comids(&self) -> &[i64] {
        &self.comids
    }

    pub fn is_empty(&self) -> bool {
        self.comids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.comids.len()
    }

    pub fn contains(&self, comid: i64) -> bool {
        self.comids.contains(&comid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip() {
        for mode in NavigationMode::ALL {
            assert_eq!(mode.as_str().parse::<NavigationMode>().unwrap(), mode);
        }
        assert_eq!("um".parse::<NavigationMode>().unwrap(), NavigationMode::UM);
        assert!("XX".parse::<NavigationMode>().is_err());
        assert!("".parse::<NavigationMode>().is_err());
    }

    #[test]
    fn test_mode_stop_rules() {
        assert!(NavigationMode::DM.accepts_stop());
        assert!(NavigationMode::PP.accepts_stop());
        assert!(!NavigationMode::UM.accepts_stop());
        assert!(!NavigationMode::UT.accepts_stop());
        assert!(!NavigationMode::DD.accepts_stop());
    }

    #[test]
    fn test_nav_result_deduplicates_preserving_order() {
        let nav = NavResult::from_ordered([5, 3, 5, 9, 3, 1]);
        assert_eq!(nav.comids(), &[5, 3, 9, 1]);
    }

    #[test]
    fn test_empty_nav_result() {
        let nav = NavResult::from_ordered([]);
        assert!(nav.is_empty());
        assert_eq!(nav.len(), 0);
    }

    #[test]
    fn test_column_mapping_allow_list() {
        let mut mapping = ColumnMapping {
            feature_id: "MonitoringLocationIdentifier".to_string(),
            feature_name: "MonitoringLocationName".to_string(),
            feature_uri: "siteUrl".to_string(),
            feature_reach: None,
            feature_measure: None,
        };
        assert!(mapping.validate().is_ok());

        mapping.feature_id = "id; DROP TABLE feature".to_string();
        assert!(mapping.validate().is_err());

        mapping.feature_id = String::new();
        assert!(mapping.validate().is_err());
    }

    #[test]
    fn test_comid_source_is_reserved() {
        let src = CrawlerSource::comid();
        assert_eq!(src.source_id, COMID_SOURCE_ID);
        assert_eq!(src.suffix, "comid");
        assert!(src.is_comid());
    }
}
