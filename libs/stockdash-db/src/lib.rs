//! Shared database connection for stockdash.
//!
//! The process owns exactly one [`ConnectionCache`]; data-access code calls
//! [`ConnectionCache::acquire`] before issuing queries and never keeps the
//! handle beyond the process lifetime.
//!
//! # Example
//! ```rust,no_run
//! use stockdash_db::{ConnectionCache, DbConfig, SeaOrmConnector};
//!
//! # async fn demo() -> Result<(), stockdash_db::DbError> {
//! let cfg = DbConfig {
//!     dsn: Some("sqlite::memory:".to_owned()),
//!     ..Default::default()
//! };
//! let cache = ConnectionCache::new(SeaOrmConnector, &cfg)?;
//!
//! // Concurrent first callers share a single connection attempt.
//! let (a, b) = tokio::join!(cache.acquire(), cache.acquire());
//! assert_eq!(a?.dsn(), b?.dsn());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod connector;
pub mod health;
pub mod options;

mod error;

pub use cache::ConnectionCache;
pub use config::{DbConfig, PoolCfg};
pub use connector::{ConnectTarget, Connector, DbHandle, SeaOrmConnector};
pub use error::{ConnectError, DbError, Result};
pub use health::{Ping, ProbeStatus, probe_database};
pub use options::{DbEngine, redact_credentials_in_dsn};
