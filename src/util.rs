//! Small helpers shared across modules.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Join URL segments with single slashes, regardless of how the pieces
/// are delimited.
pub fn url_join<S: AsRef<str>>(base: &str, segments: impl IntoIterator<Item = S>) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for segment in segments {
        url.push('/');
        url.push_str(segment.as_ref().trim_matches('/'));
    }
    url
}

fn point_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*POINT\s*\(\s*(-?\d+(?:\.\d+)?)\s+(-?\d+(?:\.\d+)?)\s*\)\s*$")
            .unwrap()
    })
}

/// Parse a `POINT(lon lat)` coordinate string.
///
/// Longitude must fall in [-180, 180] and latitude in [-90, 90]. Inputs
/// with swapped axes are rejected only when they land outside those
/// bounds; no attempt is made to auto-correct them.
pub fn parse_point(coords: &str) -> Result<(f64, f64)> {
    let caps = point_regex()
        .captures(coords)
        .ok_or_else(|| Error::invalid(format!("Could not parse POINT from '{coords}'")))?;

    // The regex only admits decimal literals, so these parses cannot fail.
    let lon: f64 = caps[1].parse().unwrap_or(f64::NAN);
    let lat: f64 = caps[2].parse().unwrap_or(f64::NAN);

    if !(-180.0..=180.0).contains(&lon) {
        return Err(Error::invalid(format!("Longitude {lon} out of range [-180, 180]")));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(Error::invalid(format!("Latitude {lat} out of range [-90, 90]")));
    }
    Ok((lon, lat))
}

/// Render a (lon, lat) pair back to WKT for PostGIS binds.
pub fn point_wkt(lon: f64, lat: f64) -> String {
    format!("POINT({lon} {lat})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join() {
        assert_eq!(
            url_join("https://example.gov/api/nldi/", ["linked-data", "comid"]),
            "https://example.gov/api/nldi/linked-data/comid"
        );
        assert_eq!(
            url_join("https://example.gov", ["/linked-data/", "wqp", "USGS-1234", "navigation"]),
            "https://example.gov/linked-data/wqp/USGS-1234/navigation"
        );
    }

    #[test]
    fn test_parse_point_accepts_whitespace_variants() {
        assert_eq!(parse_point("POINT(-89.509 43.087)").unwrap(), (-89.509, 43.087));
        assert_eq!(parse_point("POINT (-89.509 43.087)").unwrap(), (-89.509, 43.087));
        assert_eq!(parse_point("  point( -89.509   43.087 ) ").unwrap(), (-89.509, 43.087));
        assert_eq!(parse_point("POINT(0 0)").unwrap(), (0.0, 0.0));
    }

    #[test]
    fn test_parse_point_rejects_garbage() {
        assert!(parse_point("POINT(-89.509)").is_err());
        assert!(parse_point("POINT(a b)").is_err());
        assert!(parse_point("LINESTRING(0 0, 1 1)").is_err());
        assert!(parse_point("").is_err());
        assert!(parse_point("-89.509 43.087").is_err());
    }

    #[test]
    fn test_parse_point_rejects_out_of_range() {
        // Swapped lat/lon is only caught when it leaves the longitude domain.
        assert!(parse_point("POINT(43.087 -89.509)").is_ok());
        assert!(parse_point("POINT(-190 45)").is_err());
        assert!(parse_point("POINT(-89.5 95)").is_err());
        assert!(parse_point("POINT(181 0)").is_err());
    }

    #[test]
    fn test_point_wkt_round_trip() {
        let (lon, lat) = parse_point("POINT(-89.509 43.087)").unwrap();
        assert_eq!(point_wkt(lon, lat), "POINT(-89.509 43.087)");
    }
}
