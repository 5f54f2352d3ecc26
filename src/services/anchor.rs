//! Resolution of heterogeneous start identifiers to a navigation anchor.

use crate::error::{Error, Result};
use crate::model::{Anchor, AnchorOrigin, CrawlerSource, Feature, IngestType};
use crate::repository::Db;

/// Turns a (source, identifier) pair into a COMID anchor.
pub struct AnchorResolver<'a> {
    db: &'a Db,
}

impl<'a> AnchorResolver<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Resolve against the source the identifier belongs to. For the
    /// synthetic comid source the identifier is the COMID itself; for
    /// crawler sources it is the provider-scoped feature identifier.
    pub async fn resolve(&self, source: &CrawlerSource, identifier: &str) -> Result<Anchor> {
        if source.is_comid() {
            let comid = parse_comid(identifier)?;
            self.db
                .flowlines()
                .get(comid)
                .await?
                .ok_or_else(|| Error::not_found(format!("COMID {comid} not found")))?;
            return Ok(Anchor::for_comid(comid));
        }

        let feature = self.feature(source, identifier).await?;
        let comid = feature.comid.ok_or_else(|| {
            Error::not_found(format!(
                "The feature {identifier} from source '{}' is not indexed",
                source.suffix
            ))
        })?;

        // Reach-indexed features carry a position along the flowline;
        // point features are only snapped to a catchment.
        let measure = match source.ingest_type {
            IngestType::Reach => feature.measure,
            IngestType::Point => None,
        };

        Ok(Anchor {
            comid,
            measure,
            origin: AnchorOrigin::Feature {
                source_suffix: source.suffix.clone(),
            },
            trim_geometry: None,
        })
    }

    /// The feature row backing an anchor, for callers that also need its
    /// geometry.
    pub async fn feature(&self, source: &CrawlerSource, identifier: &str) -> Result<Feature> {
        self.db
            .features()
            .get(source.source_id, identifier)
            .await?
            .ok_or_else(|| {
                Error::not_found(format!("Not Found: {}/{identifier}", source.suffix))
            })
    }
}

/// Parse a COMID path segment. Non-numeric input is a client error, not
/// a missing resource.
pub fn parse_comid(identifier: &str) -> Result<i64> {
    identifier
        .parse::<i64>()
        .map_err(|_| Error::invalid(format!("Could not make '{identifier}' an integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comid() {
        assert_eq!(parse_comid("13297198").unwrap(), 13_297_198);
        // Wider than i32; still a valid lookup key that will miss.
        assert_eq!(parse_comid("99999999999").unwrap(), 99_999_999_999);
        assert!(matches!(parse_comid("abc"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_comid("12.5"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_comid(""), Err(Error::InvalidInput(_))));
    }
}
