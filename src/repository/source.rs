//! Lookups and upserts against `nldi_data.crawler_source`.

use diesel::sql_types::{Integer, Nullable, Text};
use diesel::QueryableByName;
use diesel_async::RunQueryDsl;

use crate::error::Result;
use crate::model::{ColumnMapping, CrawlerSource, IngestType};

use super::pool::Db;

#[derive(QueryableByName)]
struct CrawlerSourceRow {
    #[diesel(sql_type = Integer)]
    crawler_source_id: i32,
    #[diesel(sql_type = Nullable<Text>)]
    source_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    source_suffix: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    source_uri: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    feature_id: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    feature_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    feature_uri: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    feature_reach: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    feature_measure: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    ingest_type: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    feature_type: Option<String>,
}

impl From<CrawlerSourceRow> for CrawlerSource {
    fn from(row: CrawlerSourceRow) -> Self {
        CrawlerSource {
            source_id: row.crawler_source_id,
            suffix: row.source_suffix.unwrap_or_default().to_lowercase(),
            name: row.source_name.unwrap_or_default(),
            uri: row.source_uri.unwrap_or_default(),
            columns: ColumnMapping {
                feature_id: row.feature_id.unwrap_or_default(),
                feature_name: row.feature_name.unwrap_or_default(),
                feature_uri: row.feature_uri.unwrap_or_default(),
                feature_reach: row.feature_reach,
                feature_measure: row.feature_measure,
            },
            ingest_type: row
                .ingest_type
                .as_deref()
                .and_then(|s| s.parse::<IngestType>().ok())
                .unwrap_or(IngestType::Point),
            feature_type: row.feature_type,
        }
    }
}

const SELECT_COLUMNS: &str = "crawler_source_id, source_name, source_suffix, source_uri, \
     feature_id, feature_name, feature_uri, feature_reach, feature_measure, \
     ingest_type, feature_type";

/// Read and reconcile the crawler-source table.
#[derive(Clone)]
pub struct CrawlerSourceRepository {
    db: Db,
}

impl CrawlerSourceRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// All registered sources in stable `crawler_source_id` order.
    pub async fn list(&self) -> Result<Vec<CrawlerSource>> {
        let mut conn = self.db.session().await?;
        let rows: Vec<CrawlerSourceRow> = diesel::sql_query(format!(
            "SELECT {SELECT_COLUMNS} FROM nldi_data.crawler_source ORDER BY crawler_source_id"
        ))
        .get_results(&mut conn)
        .await?;
        Ok(rows.into_iter().map(CrawlerSource::from).collect())
    }

    /// Case-insensitive lookup by URL suffix.
    pub async fn get_by_suffix(&self, suffix: &str) -> Result<Option<CrawlerSource>> {
        let mut conn = self.db.session().await?;
        let mut rows: Vec<CrawlerSourceRow> = diesel::sql_query(format!(
            "SELECT {SELECT_COLUMNS} FROM nldi_data.crawler_source \
             WHERE lower(source_suffix) = $1"
        ))
        .bind::<Text, _>(suffix.to_lowercase())
        .get_results(&mut conn)
        .await?;
        Ok(rows.pop().map(CrawlerSource::from))
    }

    /// Insert or update one source row. Never deletes; removal is an
    /// operator action on the database.
    pub async fn upsert(&self, source: &CrawlerSource) -> Result<()> {
        let mut conn = self.db.session().await?;
        diesel::sql_query(
            "INSERT INTO nldi_data.crawler_source \
               (crawler_source_id, source_name, source_suffix, source_uri, \
                feature_id, feature_name, feature_uri, feature_reach, feature_measure, \
                ingest_type, feature_type) \
             VALUES ($1, $2, lower($3), $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (crawler_source_id) DO UPDATE SET \
               source_name = EXCLUDED.source_name, \
               source_suffix = EXCLUDED.source_suffix, \
               source_uri = EXCLUDED.source_uri, \
               feature_id = EXCLUDED.feature_id, \
               feature_name = EXCLUDED.feature_name, \
               feature_uri = EXCLUDED.feature_uri, \
               feature_reach = EXCLUDED.feature_reach, \
               feature_measure = EXCLUDED.feature_measure, \
               ingest_type = EXCLUDED.ingest_type, \
               feature_type = EXCLUDED.feature_type",
        )
        .bind::<Integer, _>(source.source_id)
        .bind::<Text, _>(&source.name)
        .bind::<Text, _>(&source.suffix)
        .bind::<Text, _>(&source.uri)
        .bind::<Text, _>(&source.columns.feature_id)
        .bind::<Text, _>(&source.columns.feature_name)
        .bind::<Text, _>(&source.columns.feature_uri)
        .bind::<Nullable<Text>, _>(source.columns.feature_reach.as_deref())
        .bind::<Nullable<Text>, _>(source.columns.feature_measure.as_deref())
        .bind::<Text, _>(source.ingest_type.as_str())
        .bind::<Nullable<Text>, _>(source.feature_type.as_deref())
        .execute(&mut conn)
        .await?;
        Ok(())
    }
}
