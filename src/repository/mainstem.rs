//! Lookups against `nldi_data.mainstem_lookup`.

use diesel::sql_types::{BigInt, Nullable, Text};
use diesel::QueryableByName;
use diesel_async::RunQueryDsl;

use crate::error::Result;

use super::pool::Db;

#[derive(QueryableByName)]
struct MainstemRow {
    #[diesel(sql_type = Nullable<Text>)]
    uri: Option<String>,
}

/// Maps a COMID to its canonical mainstem URI. A miss is an absent
/// annotation, not an error.
#[derive(Clone)]
pub struct MainstemRepository {
    db: Db,
}

impl MainstemRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get(&self, comid: i64) -> Result<Option<String>> {
        let mut conn = self.db.session().await?;
        let mut rows: Vec<MainstemRow> = diesel::sql_query(
            "SELECT uri FROM nldi_data.mainstem_lookup WHERE nhdpv2_comid = $1",
        )
        .bind::<BigInt, _>(comid)
        .get_results(&mut conn)
        .await?;
        Ok(rows.pop().and_then(|row| row.uri))
    }
}
