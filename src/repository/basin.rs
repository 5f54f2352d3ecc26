//! Upstream basin aggregation.
//!
//! The basin is never persisted; it is the union of every catchment
//! upstream of the anchor, computed on demand inside PostGIS.

use diesel::sql_types::{BigInt, Nullable, Text};
use diesel::QueryableByName;
use diesel_async::RunQueryDsl;

use crate::error::{Error, Result};

use super::{parse_geojson, pool::Db};

#[derive(QueryableByName)]
struct GeometryRow {
    #[diesel(sql_type = Nullable<Text>)]
    geojson: Option<String>,
}

/// Basin polygon queries.
#[derive(Clone)]
pub struct BasinRepository {
    db: Db,
}

impl BasinRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Aggregated polygon of all catchments upstream of a COMID. The
    /// upstream set is the unbounded upstream-with-tributaries traversal.
    pub async fn upstream_basin(
        &self,
        comid: i64,
        simplified: bool,
    ) -> Result<serde_json::Value> {
        let geom = if simplified {
            "ST_AsGeoJSON(ST_Simplify(ST_Union(c.the_geom), 0.001), 9, 0) AS geojson"
        } else {
            "ST_AsGeoJSON(ST_Union(c.the_geom), 9, 0) AS geojson"
        };
        let mut conn = self.db.session().await?;
        let mut rows: Vec<GeometryRow> = diesel::sql_query(format!(
            "SELECT {geom} \
             FROM nhdplus_navigation.navigate('UT', $1::integer, NULL::numeric, NULL::integer) AS nav \
             JOIN nhdplus.catchmentsp c ON c.featureid = nav.comid"
        ))
        .bind::<BigInt, _>(comid)
        .get_results(&mut conn)
        .await?;

        parse_geojson(rows.pop().and_then(|row| row.geojson))?
            .ok_or_else(|| Error::not_found(format!("No basin found for COMID {comid}")))
    }
}
