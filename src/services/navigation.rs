//! Navigation request validation and execution.
//!
//! Traversal itself is the database's job; this layer enforces the
//! parameter contract, decides whether the starting flowline gets
//! clipped, and joins the resulting COMID set against the output tables.

use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::{Error, Result};
use crate::model::{Anchor, AnchorOrigin, CrawlerSource, Feature, Flowline, NavResult, NavigationMode};
use crate::repository::{Db, FlowlineTrim};

/// Exclusive upper bound on the navigation distance in kilometres.
pub const MAX_DISTANCE_KM: f64 = 10_000.0;

/// Raw query parameters of the navigation endpoint. Values arrive as
/// strings so that malformed input maps to a clean 400 instead of a
/// framework rejection.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NavigationParams {
    /// Distance budget in kilometres, exclusive range (0, 10000).
    pub distance: Option<String>,
    /// COMID to stop at; DM and PP only, required for PP.
    #[serde(rename = "stopComid")]
    pub stop_comid: Option<String>,
    /// Clip the first flowline at the anchor measure.
    #[serde(rename = "trimStart")]
    pub trim_start: Option<String>,
    /// Skip trimming when the anchor sits within this many measure
    /// percent of the reach end.
    #[serde(rename = "trimTolerance")]
    pub trim_tolerance: Option<String>,
    /// Accepted for forward compatibility; has no effect.
    pub legacy: Option<String>,
    /// Leave flowline geometry out of the response.
    #[serde(rename = "excludeGeometry")]
    pub exclude_geometry: Option<String>,
}

/// A validated navigation request.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationRequest {
    pub mode: NavigationMode,
    /// Always present except for PP, where the traversal runs start to
    /// stop regardless of distance.
    pub distance_km: Option<f64>,
    pub stop_comid: Option<i64>,
    pub trim_start: bool,
    pub trim_tolerance: f64,
    pub exclude_geometry: bool,
}

fn parse_flag(raw: Option<&str>, name: &str) -> Result<bool> {
    match raw {
        None => Ok(false),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(Error::invalid(format!("Invalid {name} provided"))),
        },
    }
}

/// Check a mode string and query parameters against the navigation
/// contract. Everything here runs before any database work.
pub fn validate_request(mode_raw: &str, params: &NavigationParams) -> Result<NavigationRequest> {
    let mode: NavigationMode = mode_raw.parse()?;

    if let Some(legacy) = params.legacy.as_deref() {
        tracing::debug!(legacy, "Accepting legacy parameter with no effect");
    }

    let distance_km = if mode == NavigationMode::PP {
        None
    } else {
        let raw = params
            .distance
            .as_deref()
            .ok_or_else(|| Error::invalid("Required parameter 'distance' is not present"))?;
        let distance: f64 = raw
            .trim()
            .parse()
            .map_err(|_| Error::invalid("Invalid distance provided"))?;
        if !distance.is_finite() || distance <= 0.0 || distance >= MAX_DISTANCE_KM {
            return Err(Error::invalid(format!(
                "distance must be greater than 0 and less than {MAX_DISTANCE_KM} km"
            )));
        }
        Some(distance)
    };

    let stop_comid = match params.stop_comid.as_deref() {
        Some(raw) => {
            if !mode.accepts_stop() {
                return Err(Error::invalid(format!(
                    "stopComid is not valid for navigation mode {mode}"
                )));
            }
            Some(
                raw.trim()
                    .parse::<i64>()
                    .map_err(|_| Error::invalid("Invalid stopComid provided"))?,
            )
        }
        None => {
            if mode == NavigationMode::PP {
                return Err(Error::invalid(
                    "Required parameter 'stopComid' is not present for point-to-point navigation",
                ));
            }
            None
        }
    };

    let trim_tolerance = match params.trim_tolerance.as_deref() {
        None => 0.0,
        Some(raw) => {
            let tolerance: f64 = raw
                .trim()
                .parse()
                .map_err(|_| Error::invalid("Invalid trimTolerance provided"))?;
            if !(0.0..=100.0).contains(&tolerance) {
                return Err(Error::invalid("trimTolerance must be in [0, 100]"));
            }
            tolerance
        }
    };

    Ok(NavigationRequest {
        mode,
        distance_km,
        stop_comid,
        trim_start: parse_flag(params.trim_start.as_deref(), "trimStart")?,
        trim_tolerance,
        exclude_geometry: parse_flag(params.exclude_geometry.as_deref(), "excludeGeometry")?,
    })
}

/// Trimming applies only when the anchor sits far enough from the reach
/// end to leave a visible remainder.
pub fn should_trim(measure: f64, tolerance: f64) -> bool {
    100.0 - measure >= tolerance
}

/// Executes validated navigation requests.
pub struct NavigationService {
    db: Db,
}

impl NavigationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// The ordered COMID set for a request.
    pub async fn comids(&self, anchor: &Anchor, request: &NavigationRequest) -> Result<NavResult> {
        self.db
            .navigation()
            .navigate(
                request.mode,
                anchor.comid,
                request.distance_km,
                request.stop_comid,
            )
            .await
    }

    /// Work out where, if anywhere, the starting flowline gets clipped.
    ///
    /// The anchor measure wins when present and nonzero; reach features
    /// persisted with measure zero fall back to projecting the feature
    /// location onto its flowline. A bare COMID start has no position on
    /// its reach, so nothing is clipped.
    pub async fn resolve_trim(
        &self,
        anchor: &Anchor,
        request: &NavigationRequest,
        source: &CrawlerSource,
        identifier: &str,
    ) -> Result<Option<FlowlineTrim>> {
        if !request.trim_start {
            return Ok(None);
        }
        let measure = match anchor.measure {
            Some(measure) if measure > 0.0 => Some(measure),
            _ => match anchor.origin {
                AnchorOrigin::Feature { .. } => {
                    self.db
                        .features()
                        .estimate_measure(source.source_id, identifier)
                        .await?
                }
                _ => None,
            },
        };
        Ok(measure
            .filter(|m| should_trim(*m, request.trim_tolerance))
            .map(|measure| FlowlineTrim {
                comid: anchor.comid,
                measure,
                downstream: request.mode.is_downstream(),
            }))
    }

    /// Flowlines along the navigation, in traversal order.
    pub async fn flowlines(
        &self,
        nav: &NavResult,
        request: &NavigationRequest,
        trim: Option<FlowlineTrim>,
    ) -> Result<Vec<Flowline>> {
        match trim {
            Some(trim) if !request.exclude_geometry => {
                self.db
                    .flowlines()
                    .for_navigation_trimmed(nav.comids(), trim)
                    .await
            }
            _ => {
                self.db
                    .flowlines()
                    .for_navigation(nav.comids(), request.exclude_geometry)
                    .await
            }
        }
    }

    /// Features of a registered source along the navigation.
    pub async fn features(
        &self,
        nav: &NavResult,
        data_source: &CrawlerSource,
    ) -> Result<Vec<Feature>> {
        self.db
            .features()
            .along_navigation(data_source.source_id, nav.comids())
            .await
    }
}
