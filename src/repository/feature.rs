//! Lookups against the shared `nldi_data.feature` table.
//!
//! Every query is scoped to one crawler source; features carry their
//! mainstem URI when the COMID has one.

use diesel::sql_types::{Array, BigInt, Double, Integer, Nullable, Text};
use diesel::QueryableByName;
use diesel_async::RunQueryDsl;

use crate::error::Result;
use crate::model::Feature;

use super::{parse_geojson, pool::Db};

#[derive(QueryableByName)]
struct FeatureRow {
    #[diesel(sql_type = Integer)]
    crawler_source_id: i32,
    #[diesel(sql_type = Nullable<Text>)]
    identifier: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    uri: Option<String>,
    #[diesel(sql_type = Nullable<BigInt>)]
    comid: Option<i64>,
    #[diesel(sql_type = Nullable<Text>)]
    reachcode: Option<String>,
    #[diesel(sql_type = Nullable<Double>)]
    measure: Option<f64>,
    #[diesel(sql_type = Nullable<Text>)]
    mainstem: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    geojson: Option<String>,
}

impl FeatureRow {
    fn into_feature(self) -> Result<Feature> {
        Ok(Feature {
            source_id: self.crawler_source_id,
            identifier: self.identifier.unwrap_or_default(),
            name: self.name,
            uri: self.uri,
            comid: self.comid,
            reachcode: self.reachcode,
            measure: self.measure,
            mainstem: self.mainstem,
            geometry: parse_geojson(self.geojson)?,
        })
    }
}

#[derive(QueryableByName)]
struct EstimatedMeasureRow {
    #[diesel(sql_type = Nullable<Double>)]
    measure: Option<f64>,
}

const FEATURE_SELECT: &str = "f.crawler_source_id, f.identifier, f.name, f.uri, \
     f.comid::bigint AS comid, f.reachcode, \
     f.measure::double precision AS measure, \
     m.uri AS mainstem, \
     ST_AsGeoJSON(f.location, 9, 0) AS geojson";

const MAINSTEM_JOIN: &str = "LEFT JOIN nldi_data.mainstem_lookup m ON m.nhdpv2_comid = f.comid";

/// Feature lookups for one crawler source at a time.
#[derive(Clone)]
pub struct FeatureRepository {
    db: Db,
}

impl FeatureRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// One feature by provider-scoped identifier.
    pub async fn get(&self, source_id: i32, identifier: &str) -> Result<Option<Feature>> {
        let mut conn = self.db.session().await?;
        let mut rows: Vec<FeatureRow> = diesel::sql_query(format!(
            "SELECT {FEATURE_SELECT} \
             FROM nldi_data.feature f {MAINSTEM_JOIN} \
             WHERE f.crawler_source_id = $1 AND f.identifier = $2"
        ))
        .bind::<Integer, _>(source_id)
        .bind::<Text, _>(identifier)
        .get_results(&mut conn)
        .await?;
        rows.pop().map(FeatureRow::into_feature).transpose()
    }

    /// Features of a source in ascending identifier order, paged.
    pub async fn list(&self, source_id: i32, limit: i64, offset: i64) -> Result<Vec<Feature>> {
        let mut conn = self.db.session().await?;
        let rows: Vec<FeatureRow> = diesel::sql_query(format!(
            "SELECT {FEATURE_SELECT} \
             FROM nldi_data.feature f {MAINSTEM_JOIN} \
             WHERE f.crawler_source_id = $1 \
             ORDER BY f.identifier \
             LIMIT $2 OFFSET $3"
        ))
        .bind::<Integer, _>(source_id)
        .bind::<BigInt, _>(limit)
        .bind::<BigInt, _>(offset)
        .get_results(&mut conn)
        .await?;
        rows.into_iter().map(FeatureRow::into_feature).collect()
    }

    /// Features of a source that fall along an ordered navigation set.
    /// Navigation order first, then identifier for reproducibility.
    pub async fn along_navigation(&self, source_id: i32, comids: &[i64]) -> Result<Vec<Feature>> {
        if comids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.db.session().await?;
        let rows: Vec<FeatureRow> = diesel::sql_query(format!(
            "SELECT {FEATURE_SELECT} \
             FROM unnest($1::bigint[]) WITH ORDINALITY AS nav(comid, ord) \
             JOIN nldi_data.feature f ON f.comid = nav.comid AND f.crawler_source_id = $2 \
             {MAINSTEM_JOIN} \
             ORDER BY nav.ord, f.identifier"
        ))
        .bind::<Array<BigInt>, _>(comids)
        .bind::<Integer, _>(source_id)
        .get_results(&mut conn)
        .await?;
        rows.into_iter().map(FeatureRow::into_feature).collect()
    }

    /// Estimate the measure of a point feature by projecting its location
    /// onto the flowline it is indexed against. Used when trimming is
    /// requested but the feature row stores no measure.
    pub async fn estimate_measure(
        &self,
        source_id: i32,
        identifier: &str,
    ) -> Result<Option<f64>> {
        let mut conn = self.db.session().await?;
        let mut rows: Vec<EstimatedMeasureRow> = diesel::sql_query(
            "SELECT (fl.fmeasure + \
                (1 - ST_LineLocatePoint(fl.shape, f.location)) \
                * (fl.tmeasure - fl.fmeasure))::double precision AS measure \
             FROM nldi_data.feature f \
             JOIN nhdplus.nhdflowline_np21 fl ON fl.nhdplus_comid = f.comid \
             WHERE f.crawler_source_id = $1 AND f.identifier = $2",
        )
        .bind::<Integer, _>(source_id)
        .bind::<Text, _>(identifier)
        .get_results(&mut conn)
        .await?;
        Ok(rows.pop().and_then(|row| row.measure))
    }
}
