//! Connectivity probe used by health reporting.

use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;

use crate::cache::ConnectionCache;
use crate::connector::{Connector, DbHandle};

/// Handles that can verify they still reach the server.
#[async_trait]
pub trait Ping {
    async fn ping(&self) -> Result<(), String>;
}

#[async_trait]
impl Ping for DbHandle {
    async fn ping(&self) -> Result<(), String> {
        DbHandle::ping(self).await.map_err(|e| e.to_string())
    }
}

/// Outcome of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeStatus {
    pub ok: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Acquires the shared handle and pings it. Never fails; the failure is
/// reported inside the status.
pub async fn probe_database<C>(cache: &ConnectionCache<C>) -> ProbeStatus
where
    C: Connector,
    C::Handle: Ping,
{
    let started = Instant::now();
    let result = match cache.acquire().await {
        Ok(handle) => handle.ping().await,
        Err(e) => Err(e.to_string()),
    };
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(()) => ProbeStatus {
            ok: true,
            error: None,
            duration_ms,
        },
        Err(error) => {
            tracing::warn!(error = %error, "Database probe failed");
            ProbeStatus {
                ok: false,
                error: Some(error),
                duration_ms,
            }
        }
    }
}
