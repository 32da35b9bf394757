//! HTTP cache warmer.
//!
//! Issues a fire-and-forget GET for a new preview so the image is already in
//! the HTTP caches when the user commits. Every failure is logged at debug
//! level and otherwise ignored.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, trace};

use crate::domain::ports::ImageWarmer;

/// Crypto provider already installed by the process, else aws-lc-rs.
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Prefetches `http(s)` references with a bounded timeout.
#[derive(Clone)]
pub struct HttpWarmer {
    client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpWarmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpWarmer")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpWarmer {
    /// # Errors
    /// Returns an error when the TLS configuration cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, rustls::Error> {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(crypto_provider())?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(https);
        Ok(Self { client, timeout })
    }

    /// Only network references are worth fetching; inline `data:` uploads
    /// and anything else are skipped.
    #[must_use]
    pub fn is_fetchable(reference: &str) -> bool {
        let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }
}

impl ImageWarmer for HttpWarmer {
    fn warm(&self, reference: &str) {
        if !Self::is_fetchable(reference) {
            trace!("Skipping warm-up for non-http reference");
            return;
        }
        let uri: http::Uri = match reference.parse() {
            Ok(uri) => uri,
            Err(e) => {
                debug!(error = %e, "Skipping warm-up for unparsable reference");
                return;
            }
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime; skipping avatar warm-up");
            return;
        };

        let client = self.client.clone();
        let timeout = self.timeout;
        runtime.spawn(async move {
            let fetch = async {
                let request = http::Request::get(uri.clone())
                    .body(Empty::<Bytes>::new())
                    .map_err(|e| e.to_string())?;
                let response = client.request(request).await.map_err(|e| e.to_string())?;
                let status = response.status();
                response
                    .into_body()
                    .collect()
                    .await
                    .map_err(|e| e.to_string())?;
                Ok::<_, String>(status)
            };
            match tokio::time::timeout(timeout, fetch).await {
                Ok(Ok(status)) => debug!(uri = %uri, status = status.as_u16(), "Warmed avatar"),
                Ok(Err(e)) => debug!(uri = %uri, error = %e, "Avatar warm-up failed"),
                Err(_) => debug!(uri = %uri, "Avatar warm-up timed out"),
            }
        });
    }
}
