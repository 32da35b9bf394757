//! Connection establishment port and its sea-orm implementation.

use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::config::{DbConfig, PoolCfg};
use crate::error::ConnectError;
use crate::options::{DbEngine, engine_from_dsn, redact_credentials_in_dsn};
use crate::Result;

/// Validated connection target handed to a [`Connector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    dsn: String,
    engine: DbEngine,
    pool: PoolCfg,
}

impl ConnectTarget {
    /// Builds a target from configuration.
    ///
    /// Returns `Ok(None)` when no DSN is configured.
    ///
    /// # Errors
    /// Returns an error when the DSN scheme is not supported.
    pub fn from_config(cfg: &DbConfig) -> Result<Option<Self>> {
        let Some(dsn) = cfg.target_dsn() else {
            return Ok(None);
        };
        let engine = engine_from_dsn(dsn)?;
        Ok(Some(Self {
            dsn: dsn.to_owned(),
            engine,
            pool: cfg.pool.clone(),
        }))
    }

    #[must_use]
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// DSN with the password masked, safe for logs.
    #[must_use]
    pub fn redacted(&self) -> String {
        redact_credentials_in_dsn(Some(&self.dsn))
    }

    #[must_use]
    pub fn engine(&self) -> DbEngine {
        self.engine
    }

    #[must_use]
    pub fn pool(&self) -> &PoolCfg {
        &self.pool
    }
}

/// Establishes one connection (pool) to the backing store.
///
/// Implementations perform I/O and are invoked by
/// [`ConnectionCache`](crate::ConnectionCache) at most once per attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The established resource. Shared read-only by every caller.
    type Handle: Clone + Send + Sync + 'static;

    async fn connect(
        &self,
        target: &ConnectTarget,
    ) -> std::result::Result<Self::Handle, ConnectError>;
}

/// Established database handle.
#[derive(Debug, Clone)]
pub struct DbHandle {
    conn: DatabaseConnection,
    engine: DbEngine,
    dsn: String,
}

impl DbHandle {
    #[must_use]
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    #[must_use]
    pub fn engine(&self) -> DbEngine {
        self.engine
    }

    /// Redacted DSN this handle was built from.
    #[must_use]
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Round-trips to the server.
    ///
    /// # Errors
    /// Returns the driver error when the pool cannot reach the server.
    pub async fn ping(&self) -> std::result::Result<(), sea_orm::DbErr> {
        self.conn.ping().await
    }
}

/// Production connector backed by sea-orm's sqlx pools.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeaOrmConnector;

impl SeaOrmConnector {
    fn options(target: &ConnectTarget) -> ConnectOptions {
        let mut opts = ConnectOptions::new(target.dsn().to_owned());
        let pool = target.pool();
        if let Some(n) = pool.max_conns {
            opts.max_connections(n);
        }
        if let Some(n) = pool.min_conns {
            opts.min_connections(n);
        }
        if let Some(t) = pool.connect_timeout {
            opts.connect_timeout(t);
        }
        if let Some(t) = pool.acquire_timeout {
            opts.acquire_timeout(t);
        }
        if let Some(t) = pool.idle_timeout {
            opts.idle_timeout(t);
        }
        if let Some(t) = pool.max_lifetime {
            opts.max_lifetime(t);
        }
        opts.sqlx_logging(false);
        opts
    }
}

#[async_trait]
impl Connector for SeaOrmConnector {
    type Handle = DbHandle;

    async fn connect(&self, target: &ConnectTarget) -> std::result::Result<DbHandle, ConnectError> {
        let conn = Database::connect(Self::options(target))
            .await
            .map_err(|e| ConnectError::Handshake(e.to_string()))?;

        Ok(DbHandle {
            conn,
            engine: target.engine(),
            dsn: target.redacted(),
        })
    }
}
