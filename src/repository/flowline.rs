//! Lookups against `nhdplus.nhdflowline_np21`.

use diesel::sql_types::{Array, BigInt, Bool, Double, Nullable, Text};
use diesel::QueryableByName;
use diesel_async::RunQueryDsl;

use crate::error::Result;
use crate::model::Flowline;

use super::{parse_geojson, pool::Db};

#[derive(QueryableByName)]
struct FlowlineRow {
    #[diesel(sql_type = BigInt)]
    comid: i64,
    #[diesel(sql_type = Nullable<Text>)]
    permanent_identifier: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    reachcode: Option<String>,
    #[diesel(sql_type = Nullable<Double>)]
    fmeasure: Option<f64>,
    #[diesel(sql_type = Nullable<Double>)]
    tmeasure: Option<f64>,
    #[diesel(sql_type = Nullable<Double>)]
    lengthkm: Option<f64>,
    #[diesel(sql_type = Nullable<Text>)]
    mainstem: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    geojson: Option<String>,
}

impl FlowlineRow {
    fn into_flowline(self) -> Result<Flowline> {
        Ok(Flowline {
            comid: self.comid,
            permanent_identifier: self.permanent_identifier,
            reachcode: self.reachcode,
            fmeasure: self.fmeasure,
            tmeasure: self.tmeasure,
            lengthkm: self.lengthkm,
            mainstem: self.mainstem,
            geometry: parse_geojson(self.geojson)?,
        })
    }
}

#[derive(QueryableByName)]
struct MeasureRow {
    #[diesel(sql_type = Nullable<Double>)]
    measure: Option<f64>,
    #[diesel(sql_type = Nullable<Text>)]
    reachcode: Option<String>,
}

/// Where to clip the starting flowline of a navigation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowlineTrim {
    /// COMID of the flowline being clipped.
    pub comid: i64,
    /// Measure along the reach in [0, 100].
    pub measure: f64,
    /// Downstream traversals keep the lower end of the reach, upstream
    /// traversals the upper end.
    pub downstream: bool,
}

const FLOWLINE_SELECT: &str = "f.nhdplus_comid::bigint AS comid, \
     f.permanent_identifier, f.reachcode, \
     f.fmeasure::double precision AS fmeasure, \
     f.tmeasure::double precision AS tmeasure, \
     f.lengthkm::double precision AS lengthkm, \
     m.uri AS mainstem";

const MAINSTEM_JOIN: &str =
    "LEFT JOIN nldi_data.mainstem_lookup m ON m.nhdpv2_comid = f.nhdplus_comid";

/// Clipped-geometry expression for the starting flowline. The measure is
/// rescaled into the [0, 1] parameter space of `ST_LineSubstring`; values
/// outside the reach clamp to the endpoints.
const TRIM_CASE: &str = "CASE WHEN f.nhdplus_comid = $2 THEN \
       CASE WHEN $4 THEN \
         ST_AsGeoJSON(ST_LineSubstring(f.shape, \
           GREATEST(0.0, LEAST(1.0, 1.0 - (($3 - f.fmeasure) / NULLIF(f.tmeasure - f.fmeasure, 0.0)))), \
           1.0), 9, 0) \
       ELSE \
         ST_AsGeoJSON(ST_LineSubstring(f.shape, 0.0, \
           GREATEST(0.0, LEAST(1.0, 1.0 - (($3 - f.fmeasure) / NULLIF(f.tmeasure - f.fmeasure, 0.0))))), 9, 0) \
       END \
     ELSE ST_AsGeoJSON(f.shape, 9, 0) END AS geojson";

/// Flowline lookups, including order-preserving joins against a
/// navigation result.
#[derive(Clone)]
pub struct FlowlineRepository {
    db: Db,
}

impl FlowlineRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// One flowline by COMID, with geometry and mainstem annotation.
    pub async fn get(&self, comid: i64) -> Result<Option<Flowline>> {
        let mut conn = self.db.session().await?;
        let mut rows: Vec<FlowlineRow> = diesel::sql_query(format!(
            "SELECT {FLOWLINE_SELECT}, ST_AsGeoJSON(f.shape, 9, 0) AS geojson \
             FROM nhdplus.nhdflowline_np21 f {MAINSTEM_JOIN} \
             WHERE f.nhdplus_comid = $1"
        ))
        .bind::<BigInt, _>(comid)
        .get_results(&mut conn)
        .await?;
        rows.pop().map(FlowlineRow::into_flowline).transpose()
    }

    /// Flowlines for an ordered COMID set, preserving the input order.
    /// With `exclude_geometry` the shapes stay in the database.
    pub async fn for_navigation(
        &self,
        comids: &[i64],
        exclude_geometry: bool,
    ) -> Result<Vec<Flowline>> {
        if comids.is_empty() {
            return Ok(Vec::new());
        }
        let geom = if exclude_geometry {
            "NULL::text AS geojson"
        } else {
            "ST_AsGeoJSON(f.shape, 9, 0) AS geojson"
        };
        let mut conn = self.db.session().await?;
        let rows: Vec<FlowlineRow> = diesel::sql_query(format!(
            "SELECT {FLOWLINE_SELECT}, {geom} \
             FROM unnest($1::bigint[]) WITH ORDINALITY AS nav(comid, ord) \
             JOIN nhdplus.nhdflowline_np21 f ON f.nhdplus_comid = nav.comid \
             {MAINSTEM_JOIN} \
             ORDER BY nav.ord"
        ))
        .bind::<Array<BigInt>, _>(comids)
        .get_results(&mut conn)
        .await?;
        rows.into_iter().map(FlowlineRow::into_flowline).collect()
    }

    /// Flowlines for an ordered COMID set with the starting flowline
    /// clipped at the anchor measure.
    pub async fn for_navigation_trimmed(
        &self,
        comids: &[i64],
        trim: FlowlineTrim,
    ) -> Result<Vec<Flowline>> {
        if comids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.db.session().await?;
        let rows: Vec<FlowlineRow> = diesel::sql_query(format!(
            "SELECT {FLOWLINE_SELECT}, {TRIM_CASE} \
             FROM unnest($1::bigint[]) WITH ORDINALITY AS nav(comid, ord) \
             JOIN nhdplus.nhdflowline_np21 f ON f.nhdplus_comid = nav.comid \
             {MAINSTEM_JOIN} \
             ORDER BY nav.ord"
        ))
        .bind::<Array<BigInt>, _>(comids)
        .bind::<BigInt, _>(trim.comid)
        .bind::<Double, _>(trim.measure)
        .bind::<Bool, _>(trim.downstream)
        .get_results(&mut conn)
        .await?;
        rows.into_iter().map(FlowlineRow::into_flowline).collect()
    }

    /// Measure and reachcode where a point projects onto a flowline.
    pub async fn measure_at_point(
        &self,
        comid: i64,
        point_wkt: &str,
    ) -> Result<Option<(f64, Option<String>)>> {
        let mut conn = self.db.session().await?;
        let mut rows: Vec<MeasureRow> = diesel::sql_query(
            "SELECT (f.fmeasure + \
                (1 - ST_LineLocatePoint(f.shape, ST_GeomFromText($1, 4326))) \
                * (f.tmeasure - f.fmeasure))::double precision AS measure, \
                f.reachcode \
             FROM nhdplus.nhdflowline_np21 f \
             WHERE f.nhdplus_comid = $2",
        )
        .bind::<Text, _>(point_wkt)
        .bind::<BigInt, _>(comid)
        .get_results(&mut conn)
        .await?;
        Ok(rows
            .pop()
            .and_then(|row| row.measure.map(|m| (m, row.reachcode))))
    }
}
