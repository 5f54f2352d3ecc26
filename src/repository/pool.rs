//! Async PostgreSQL connection pool.
//!
//! Sessions are short-lived, read-only, and returned to the pool on
//! every exit path by deadpool's guard. Each checkout applies the
//! search path covering the reference hydrography (`nhdplus`) and the
//! crawler-managed tables (`nldi_data`).

use std::time::Duration;

use diesel_async::pooled_connection::deadpool::{Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};

use super::{
    BasinRepository, CatchmentRepository, CrawlerSourceRepository, FeatureRepository,
    FlowlineRepository, MainstemRepository, NavigationDao,
};

/// A checked-out database session.
pub type PgSession = Object<AsyncPgConnection>;

/// Shared handle to the connection pool. Cloning is cheap; all clones
/// share the same pool.
#[derive(Clone)]
pub struct Db {
    pool: Pool<AsyncPgConnection>,
    checkout_timeout: Duration,
}

impl Db {
    /// Build a pool from configuration. No connection is established
    /// until the first session is requested.
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.url());
        let pool = Pool::builder(manager)
            .max_size(config.pool_size)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build connection pool: {e}")))?;
        Ok(Db {
            pool,
            checkout_timeout: Duration::from_secs(config.checkout_timeout_secs),
        })
    }

    /// Acquire a session with the search path applied.
    pub async fn session(&self) -> Result<PgSession> {
        let mut conn = tokio::time::timeout(self.checkout_timeout, self.pool.get())
            .await
            .map_err(|_| {
                Error::DatabaseUnavailable(format!(
                    "no session available within {}s",
                    self.checkout_timeout.as_secs()
                ))
            })??;
        diesel::sql_query("SET search_path TO nldi_data, nhdplus, public")
            .execute(&mut conn)
            .await?;
        Ok(conn)
    }

    /// Verify the database is reachable; used to fail fast at startup.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.session().await?;
        diesel::sql_query("SELECT 1").execute(&mut conn).await?;
        Ok(())
    }

    pub fn sources(&self) -> CrawlerSourceRepository {
        CrawlerSourceRepository::new(self.clone())
    }

    pub fn features(&self) -> FeatureRepository {
        FeatureRepository::new(self.clone())
    }

    pub fn flowlines(&self) -> FlowlineRepository {
        FlowlineRepository::new(self.clone())
    }

    pub fn catchments(&self) -> CatchmentRepository {
        CatchmentRepository::new(self.clone())
    }

    pub fn mainstems(&self) -> MainstemRepository {
        MainstemRepository::new(self.clone())
    }

    pub fn basins(&self) -> BasinRepository {
        BasinRepository::new(self.clone())
    }

    pub fn navigation(&self) -> NavigationDao {
        NavigationDao::new(self.clone())
    }
}
