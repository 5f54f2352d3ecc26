//! Wrapper over the `nhdplus_navigation.navigate` database function.
//!
//! Graph traversal lives in the database; this layer only shapes the
//! call and preserves the function's row order end to end.

use diesel::sql_types::{BigInt, Double, Nullable, Text};
use diesel::QueryableByName;
use diesel_async::RunQueryDsl;

use crate::error::Result;
use crate::model::{NavResult, NavigationMode};

use super::pool::Db;

#[derive(QueryableByName)]
struct ComidRow {
    #[diesel(sql_type = BigInt)]
    comid: i64,
}

/// Access to the navigation set-returning function.
#[derive(Clone)]
pub struct NavigationDao {
    db: Db,
}

impl NavigationDao {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// COMIDs reachable from `start_comid` under `mode`, bounded by
    /// `distance_km` (NULL runs the traversal to its natural end) and
    /// optionally stopping at `stop_comid`.
    pub async fn navigate(
        &self,
        mode: NavigationMode,
        start_comid: i64,
        distance_km: Option<f64>,
        stop_comid: Option<i64>,
    ) -> Result<NavResult> {
        let mut conn = self.db.session().await?;
        let rows: Vec<ComidRow> = diesel::sql_query(
            "SELECT comid::bigint AS comid \
             FROM nhdplus_navigation.navigate($1, $2::integer, $3::numeric, $4::integer)",
        )
        .bind::<Text, _>(mode.as_str())
        .bind::<BigInt, _>(start_comid)
        .bind::<Nullable<Double>, _>(distance_km)
        .bind::<Nullable<BigInt>, _>(stop_comid)
        .get_results(&mut conn)
        .await?;
        Ok(NavResult::from_ordered(rows.into_iter().map(|r| r.comid)))
    }
}
