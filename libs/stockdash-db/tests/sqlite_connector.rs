#![cfg(feature = "sqlite")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end acquisition through the sea-orm connector.

use figment::{Figment, providers::Serialized};
use stockdash_db::{
    ConnectionCache, DbConfig, DbEngine, DbError, SeaOrmConnector, probe_database,
};

fn config_from(value: serde_json::Value) -> DbConfig {
    Figment::new()
        .merge(Serialized::defaults(value))
        .extract()
        .unwrap()
}

#[tokio::test]
async fn in_memory_sqlite_is_acquired_and_pinged() {
    let cfg = config_from(serde_json::json!({
        "dsn": "sqlite::memory:",
        "pool": { "max_conns": 1, "connect_timeout": "2s" },
        "attempt_timeout": "5s"
    }));
    let cache = ConnectionCache::new(SeaOrmConnector, &cfg).unwrap();

    let handle = cache.acquire().await.unwrap();
    assert_eq!(handle.engine(), DbEngine::Sqlite);
    handle.ping().await.unwrap();

    let status = probe_database(&cache).await;
    assert!(status.ok, "probe failed: {:?}", status.error);
    assert_eq!(cache.attempts(), 1);
}

#[tokio::test]
async fn unreachable_file_is_a_retryable_failure() {
    let cfg = config_from(serde_json::json!({
        "dsn": "sqlite:///nonexistent-dir/definitely/missing.db",
        "attempt_timeout": "5s"
    }));
    let cache = ConnectionCache::new(SeaOrmConnector, &cfg).unwrap();

    let err = cache.acquire().await.unwrap_err();
    assert!(matches!(err, DbError::Connect { attempt: 1, .. }));
    assert!(err.is_retryable());

    let err = cache.acquire().await.unwrap_err();
    assert!(matches!(err, DbError::Connect { attempt: 2, .. }));
}
