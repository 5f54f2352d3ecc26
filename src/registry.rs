//! The source registry: the set of known crawler sources as a
//! first-class, process-cached value.
//!
//! Built once at startup from the crawler_source table and swapped
//! atomically after an `align`, so readers always see a complete map.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::model::{CrawlerSource, COMID_SOURCE_SUFFIX};
use crate::repository::CrawlerSourceRepository;

/// Immutable view of the registered sources.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    by_suffix: HashMap<String, CrawlerSource>,
    by_id: HashMap<i32, CrawlerSource>,
    ordered: Vec<CrawlerSource>,
}

impl RegistrySnapshot {
    fn build(mut sources: Vec<CrawlerSource>) -> Self {
        sources.sort_by_key(|s| s.source_id);
        let by_suffix = sources
            .iter()
            .map(|s| (s.suffix.to_lowercase(), s.clone()))
            .collect();
        let by_id = sources.iter().map(|s| (s.source_id, s.clone())).collect();
        RegistrySnapshot {
            by_suffix,
            by_id,
            ordered: sources,
        }
    }
}

/// Process-wide registry of crawler sources.
pub struct SourceRegistry {
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl SourceRegistry {
    /// Build a registry directly from a source list.
    pub fn from_sources(sources: Vec<CrawlerSource>) -> Self {
        SourceRegistry {
            snapshot: RwLock::new(Arc::new(RegistrySnapshot::build(sources))),
        }
    }

    /// Load the registry from the crawler_source table.
    pub async fn load(repo: &CrawlerSourceRepository) -> Result<Self> {
        let sources = repo.list().await?;
        tracing::info!("Loaded {} crawler sources", sources.len());
        Ok(Self::from_sources(sources))
    }

    async fn current(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Case-insensitive lookup by URL suffix. The synthetic `comid`
    /// source always resolves.
    pub async fn get(&self, suffix: &str) -> Result<CrawlerSource> {
        let folded = suffix.to_lowercase();
        if folded == COMID_SOURCE_SUFFIX {
            return Ok(CrawlerSource::comid());
        }
        self.current()
            .await
            .by_suffix
            .get(&folded)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("No such source: '{suffix}'")))
    }

    /// Lookup by the stable numeric source id. Id 0 is the synthetic
    /// `comid` source.
    pub async fn get_by_id(&self, source_id: i32) -> Result<CrawlerSource> {
        if source_id == crate::model::COMID_SOURCE_ID {
            return Ok(CrawlerSource::comid());
        }
        self.current()
            .await
            .by_id
            .get(&source_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("No such source id: {source_id}")))
    }

    /// All registered sources in `source_id` order, without the
    /// synthetic `comid` source.
    pub async fn list(&self) -> Vec<CrawlerSource> {
        self.current().await.ordered.clone()
    }

    /// Reconcile the crawler_source table with a declarative source
    /// list: insert missing rows, update changed ones, delete nothing.
    /// The cached snapshot is rebuilt from the table afterwards.
    ///
    /// Running `align` twice with the same input is a no-op the second
    /// time.
    pub async fn align(
        &self,
        repo: &CrawlerSourceRepository,
        desired: &[CrawlerSource],
    ) -> Result<AlignReport> {
        let existing = repo.list().await?;
        let plan = plan_alignment(&existing, desired);

        for source in plan.insert.iter().chain(plan.update.iter()) {
            repo.upsert(source).await?;
            tracing::info!(suffix = %source.suffix, "Aligned crawler source");
        }

        let refreshed = repo.list().await?;
        let report = AlignReport {
            inserted: plan.insert.len(),
            updated: plan.update.len(),
            total: refreshed.len(),
        };
        *self.snapshot.write().await = Arc::new(RegistrySnapshot::build(refreshed));
        Ok(report)
    }
}

/// Outcome of an `align` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignReport {
    pub inserted: usize,
    pub updated: usize,
    pub total: usize,
}

/// Work items for one alignment pass.
#[derive(Debug, Default)]
pub struct AlignPlan {
    pub insert: Vec<CrawlerSource>,
    pub update: Vec<CrawlerSource>,
}

/// Compare table state with the desired list. Sources present in the
/// table but absent from the list are left untouched.
pub fn plan_alignment(existing: &[CrawlerSource], desired: &[CrawlerSource]) -> AlignPlan {
    let current: HashMap<i32, &CrawlerSource> =
        existing.iter().map(|s| (s.source_id, s)).collect();

    let mut plan = AlignPlan::default();
    for source in desired {
        match current.get(&source.source_id) {
            None => plan.insert.push(source.clone()),
            Some(row) if *row != source => plan.update.push(source.clone()),
            Some(_) => {}
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnMapping, IngestType};

    fn source(id: i32, suffix: &str) -> CrawlerSource {
        CrawlerSource {
            source_id: id,
            suffix: suffix.to_string(),
            name: format!("Source {suffix}"),
            uri: format!("https://example.gov/{suffix}"),
            columns: ColumnMapping {
                feature_id: "id".to_string(),
                feature_name: "name".to_string(),
                feature_uri: "uri".to_string(),
                feature_reach: None,
                feature_measure: None,
            },
            ingest_type: IngestType::Point,
            feature_type: None,
        }
    }

    #[tokio::test]
    async fn test_get_is_case_insensitive() {
        let registry = SourceRegistry::from_sources(vec![source(1, "wqp")]);
        assert_eq!(registry.get("WQP").await.unwrap().source_id, 1);
        assert_eq!(registry.get("wqp").await.unwrap().source_id, 1);
        assert!(registry.get("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let registry = SourceRegistry::from_sources(vec![source(5, "nwissite")]);
        assert_eq!(registry.get_by_id(5).await.unwrap().suffix, "nwissite");
        assert!(registry.get_by_id(0).await.unwrap().is_comid());
        assert!(registry.get_by_id(99).await.is_err());
    }

    #[tokio::test]
    async fn test_comid_source_always_resolves() {
        let registry = SourceRegistry::from_sources(Vec::new());
        let comid = registry.get("comid").await.unwrap();
        assert!(comid.is_comid());
        let comid = registry.get("COMID").await.unwrap();
        assert!(comid.is_comid());
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_source_id() {
        let registry =
            SourceRegistry::from_sources(vec![source(9, "c"), source(2, "a"), source(5, "b")]);
        let ids: Vec<i32> = registry.list().await.iter().map(|s| s.source_id).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }

    #[test]
    fn test_plan_alignment_inserts_updates_never_deletes() {
        let existing = vec![source(1, "wqp"), source(2, "nwissite")];
        let mut changed = source(2, "nwissite");
        changed.name = "NWIS Sites (renamed)".to_string();
        let desired = vec![changed.clone(), source(3, "huc12pp")];

        let plan = plan_alignment(&existing, &desired);
        assert_eq!(plan.insert.len(), 1);
        assert_eq!(plan.insert[0].source_id, 3);
        assert_eq!(plan.update.len(), 1);
        assert_eq!(plan.update[0].name, "NWIS Sites (renamed)");
        // Source 1 is absent from the desired list and stays untouched.
    }

    #[test]
    fn test_plan_alignment_is_idempotent() {
        let existing = vec![source(1, "wqp")];
        let desired = vec![source(1, "wqp"), source(2, "nwissite")];
        let first = plan_alignment(&existing, &desired);
        assert_eq!(first.insert.len(), 1);

        // After applying the first plan the table matches the input.
        let after: Vec<CrawlerSource> = desired.clone();
        let second = plan_alignment(&after, &desired);
        assert!(second.insert.is_empty());
        assert!(second.update.is_empty());
    }
}
