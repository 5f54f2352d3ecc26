//! Lookups against `nhdplus.catchmentsp`.

use diesel::sql_types::{BigInt, Nullable, Text};
use diesel::QueryableByName;
use diesel_async::RunQueryDsl;

use crate::error::Result;
use crate::model::Catchment;

use super::{parse_geojson, pool::Db};

#[derive(QueryableByName)]
struct CatchmentRow {
    #[diesel(sql_type = BigInt)]
    comid: i64,
    #[diesel(sql_type = Nullable<Text>)]
    geojson: Option<String>,
}

impl CatchmentRow {
    fn into_catchment(self) -> Result<Catchment> {
        Ok(Catchment {
            comid: self.comid,
            geometry: parse_geojson(self.geojson)?,
        })
    }
}

/// Catchment polygon lookups.
#[derive(Clone)]
pub struct CatchmentRepository {
    db: Db,
}

impl CatchmentRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// The catchment containing a point. A point on a shared boundary may
    /// intersect more than one polygon; the database's first match wins.
    pub async fn containing_point(&self, point_wkt: &str) -> Result<Option<Catchment>> {
        let mut conn = self.db.session().await?;
        let mut rows: Vec<CatchmentRow> = diesel::sql_query(
            "SELECT c.featureid::bigint AS comid, \
                ST_AsGeoJSON(c.the_geom, 9, 0) AS geojson \
             FROM nhdplus.catchmentsp c \
             WHERE ST_Intersects(c.the_geom, ST_GeomFromText($1, 4326)) \
             LIMIT 1",
        )
        .bind::<Text, _>(point_wkt)
        .get_results(&mut conn)
        .await?;
        rows.pop().map(CatchmentRow::into_catchment).transpose()
    }

    /// The catchment draining to a given flowline.
    pub async fn get(&self, comid: i64) -> Result<Option<Catchment>> {
        let mut conn = self.db.session().await?;
        let mut rows: Vec<CatchmentRow> = diesel::sql_query(
            "SELECT c.featureid::bigint AS comid, \
                ST_AsGeoJSON(c.the_geom, 9, 0) AS geojson \
             FROM nhdplus.catchmentsp c \
             WHERE c.featureid = $1",
        )
        .bind::<BigInt, _>(comid)
        .get_results(&mut conn)
        .await?;
        rows.pop().map(CatchmentRow::into_catchment).transpose()
    }
}
