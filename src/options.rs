use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::database::Database;
use crate::error::DbError;
use crate::timings::{NullTimingsProvider, TimingsProvider};
use crate::types::IsolationLevel;

/// Handler invoked when the pool cannot be built or cannot supply a
/// connection. The default only logs; terminating the process is the
/// integrator's call.
pub type FatalErrorHandler = Arc<dyn Fn(&DbError) + Send + Sync>;

/// Options consumed once when opening a [`Database`].
#[derive(Clone)]
pub struct DatabaseOptions {
    pub(crate) path: String,
    pub(crate) pool_name: String,
    pub(crate) isolation_level: IsolationLevel,
    pub(crate) max_connections: usize,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) queue_poll_interval: Duration,
    pub(crate) use_wal: bool,
    pub(crate) display_connect_info: bool,
    pub(crate) timings: Arc<dyn TimingsProvider>,
    pub(crate) on_fatal_error: FatalErrorHandler,
}

impl DatabaseOptions {
    /// Start building options for the database file at `path`
    /// (`:memory:` and `file:` URIs work the way the driver defines them).
    #[must_use]
    pub fn builder(path: impl Into<String>) -> DatabaseOptionsBuilder {
        DatabaseOptionsBuilder {
            opts: DatabaseOptions {
                path: path.into(),
                pool_name: "DB".to_string(),
                isolation_level: IsolationLevel::default(),
                max_connections: 5,
                connect_timeout: None,
                queue_poll_interval: Duration::from_millis(50),
                use_wal: true,
                display_connect_info: true,
                timings: Arc::new(NullTimingsProvider),
                on_fatal_error: default_fatal_handler(),
            },
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    #[must_use]
    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }
}

impl fmt::Debug for DatabaseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseOptions")
            .field("path", &self.path)
            .field("pool_name", &self.pool_name)
            .field("isolation_level", &self.isolation_level)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .field("queue_poll_interval", &self.queue_poll_interval)
            .field("use_wal", &self.use_wal)
            .field("display_connect_info", &self.display_connect_info)
            .finish_non_exhaustive()
    }
}

fn default_fatal_handler() -> FatalErrorHandler {
    Arc::new(|err| {
        tracing::error!("fatal database error: {err}");
    })
}

/// Fluent builder for [`DatabaseOptions`].
#[derive(Clone)]
pub struct DatabaseOptionsBuilder {
    opts: DatabaseOptions,
}

impl DatabaseOptionsBuilder {
    /// Name used for the pool and its worker threads.
    #[must_use]
    pub fn pool_name(mut self, name: impl Into<String>) -> Self {
        self.opts.pool_name = name.into();
        self
    }

    #[must_use]
    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.opts.isolation_level = level;
        self
    }

    /// Maximum pooled connections (also bounds concurrent statements).
    #[must_use]
    pub fn max_connections(mut self, max: usize) -> Self {
        self.opts.max_connections = max;
        self
    }

    /// How long `acquire` may wait for a free connection before failing
    /// with `ConnectionUnavailable`. `None` waits indefinitely.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.opts.connect_timeout = Some(timeout);
        self
    }

    /// Interval between automatic drains of the deferred queue.
    #[must_use]
    pub fn queue_poll_interval(mut self, interval: Duration) -> Self {
        self.opts.queue_poll_interval = interval;
        self
    }

    /// Toggle the WAL journal pragma applied when the pool is built.
    #[must_use]
    pub fn wal(mut self, enabled: bool) -> Self {
        self.opts.use_wal = enabled;
        self
    }

    /// Whether opening the database logs the target path.
    #[must_use]
    pub fn display_connect_info(mut self, enabled: bool) -> Self {
        self.opts.display_connect_info = enabled;
        self
    }

    #[must_use]
    pub fn timings(mut self, provider: Arc<dyn TimingsProvider>) -> Self {
        self.opts.timings = provider;
        self
    }

    #[must_use]
    pub fn on_fatal_error(mut self, handler: FatalErrorHandler) -> Self {
        self.opts.on_fatal_error = handler;
        self
    }

    #[must_use]
    pub fn finish(self) -> DatabaseOptions {
        self.opts
    }

    /// Build the options and open the database in one step.
    ///
    /// # Errors
    /// Returns `DbError` if pool creation or the initial pragma batch fails.
    pub async fn open(self) -> Result<Database, DbError> {
        Database::open(self.finish()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let opts = DatabaseOptions::builder(":memory:")
            .pool_name("app db")
            .max_connections(2)
            .isolation_level(IsolationLevel::ReadUncommitted)
            .wal(false)
            .finish();

        assert_eq!(opts.path(), ":memory:");
        assert_eq!(opts.pool_name(), "app db");
        assert_eq!(opts.max_connections, 2);
        assert_eq!(opts.isolation_level(), IsolationLevel::ReadUncommitted);
        assert!(!opts.use_wal);
        assert!(opts.connect_timeout.is_none());
    }
}
