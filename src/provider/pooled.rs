use async_trait::async_trait;
use deadpool::managed::PoolConfig;
use deadpool_sqlite::{Config as SqliteConfig, Pool, Runtime};

use crate::error::DbError;
use crate::options::DatabaseOptions;

use super::{ConnectionProvider, PooledConnection};

/// `deadpool-sqlite` backed [`ConnectionProvider`].
pub struct PooledProvider {
    pool: Pool,
    pool_name: String,
}

impl PooledProvider {
    /// Build the pool described by `options` and run the initial pragma
    /// batch on one connection.
    ///
    /// # Errors
    /// Returns `DbError::Config` if the pool cannot be created, or a pool or
    /// driver error if the initial connection/pragma fails.
    pub async fn new(options: &DatabaseOptions) -> Result<Self, DbError> {
        let mut cfg = SqliteConfig::new(options.path.clone());
        let mut pool_cfg = PoolConfig::new(options.max_connections);
        pool_cfg.timeouts.wait = options.connect_timeout;
        cfg.pool = Some(pool_cfg);

        let pool = cfg.create_pool(Runtime::Tokio1).map_err(|e| {
            DbError::Config(format!("failed to create sqlite pool: {e}"))
        })?;

        if options.use_wal {
            let conn = pool.get().await?;
            conn.interact(|conn| {
                conn.execute_batch("PRAGMA journal_mode = WAL;")
                    .map_err(DbError::Sqlite)
            })
            .await??;
        }

        Ok(Self {
            pool,
            pool_name: options.pool_name.clone(),
        })
    }

    #[must_use]
    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }
}

#[async_trait]
impl ConnectionProvider for PooledProvider {
    async fn acquire(&self) -> Result<PooledConnection, DbError> {
        if self.pool.is_closed() {
            return Err(DbError::ConnectionUnavailable(format!(
                "pool `{}` is closed",
                self.pool_name
            )));
        }
        Ok(self.pool.get().await?)
    }

    fn shutdown(&self) {
        self.pool.close();
    }
}

impl std::fmt::Debug for PooledProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledProvider")
            .field("pool_name", &self.pool_name)
            .field("status", &self.pool.status())
            .finish()
    }
}
