//! HTTP request gateway
//!
//! Every store request goes through `HttpGateway`, which:
//! - resolves a store path to `<addr>/v1/<mount>/<group><path>`
//! - adds `?list=true` for list requests
//! - carries the run token in the `X-Vault-Token` header
//! - trusts any configured CA certificates in addition to the system roots
//! - bounds concurrent requests with a semaphore
//! - retries transient transport failures with exponential backoff

use crate::auth::AuthToken;
use crate::error::{TransportError, TransportResult};
use crate::store::{classify_reqwest_error, RequestKind, SecretStore, StoreResponse};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

/// Header carrying the store token
pub const TOKEN_HEADER: &str = "X-Vault-Token";

/// Longest backoff step (100ms << 6 = 6.4s)
const MAX_BACKOFF_SHIFT: u32 = 6;

/// Builder for the HTTP gateway
pub struct HttpGatewayBuilder {
    base: Url,
    mount: String,
    group: String,
    token: AuthToken,
    timeout: Duration,
    retries: u32,
    max_in_flight: usize,
    trust_anchors: Vec<reqwest::Certificate>,
}

impl HttpGatewayBuilder {
    /// Create a new builder for `<base>/v1/<mount>/<group>/`
    pub fn new(base: Url, mount: impl Into<String>, group: impl Into<String>, token: AuthToken) -> Self {
        Self {
            base,
            mount: mount.into(),
            group: group.into(),
            token,
            timeout: Duration::from_secs(30),
            retries: 3,
            max_in_flight: 32,
            trust_anchors: Vec::new(),
        }
    }

    /// Set per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry count for transient failures
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the bound on concurrent requests
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Add custom trust anchors
    pub fn trust_anchors(mut self, certs: Vec<reqwest::Certificate>) -> Self {
        self.trust_anchors = certs;
        self
    }

    /// Build the gateway
    pub fn build(self) -> TransportResult<HttpGateway> {
        let mut builder = reqwest::Client::builder().timeout(self.timeout);
        for cert in self.trust_anchors {
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;

        let mut root = self.base;
        root.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl {
                path: "/".to_string(),
                reason: "Store address cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .push("v1")
            .extend(self.mount.split('/'))
            .extend(self.group.split('/'));

        Ok(HttpGateway {
            client,
            root,
            token: self.token,
            retries: self.retries,
            limiter: Semaphore::new(self.max_in_flight),
        })
    }
}

/// Authenticated HTTP gateway to the secret store
pub struct HttpGateway {
    client: reqwest::Client,
    /// `<addr>/v1/<mount>/<group>` without a trailing slash
    root: Url,
    token: AuthToken,
    retries: u32,
    limiter: Semaphore,
}

impl HttpGateway {
    /// Resolve a store path to its request URL
    pub fn endpoint(&self, path: &str, kind: RequestKind) -> TransportResult<Url> {
        let mut url = self.root.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl {
                path: path.to_string(),
                reason: "Store address cannot be a base URL".to_string(),
            })?
            .extend(path.trim_start_matches('/').split('/'));

        if kind == RequestKind::List {
            url.query_pairs_mut().append_pair("list", "true");
        }

        Ok(url)
    }

    async fn send_once(&self, url: &Url, attempt: u32) -> TransportResult<StoreResponse> {
        let response = self
            .client
            .get(url.clone())
            .header(TOKEN_HEADER, self.token.expose())
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url.as_str(), e, attempt))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_reqwest_error(url.as_str(), e, attempt))?;

        Ok(StoreResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[async_trait::async_trait]
impl SecretStore for HttpGateway {
    async fn request(&self, path: &str, kind: RequestKind) -> TransportResult<StoreResponse> {
        let url = self.endpoint(path, kind)?;
        let mut last_error = None;

        for attempt in 0..=self.retries {
            if attempt > 0 {
                // Exponential backoff: 100ms, 200ms, 400ms, ...
                let shift = (attempt - 1).min(MAX_BACKOFF_SHIFT);
                let delay = Duration::from_millis(100 * (1u64 << shift));
                debug!("Retrying {} in {:?} (attempt {})", url, delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            // A slot is held per attempt, never across a backoff sleep
            let permit = self.limiter.acquire().await.map_err(|_| TransportError::Request {
                url: url.to_string(),
                reason: "Request limiter closed".to_string(),
            })?;
            let result = self.send_once(&url, attempt + 1).await;
            drop(permit);

            match result {
                Ok(response) => {
                    debug!("{:?} {} -> {}", kind, url, response.status);
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    warn!("Transient store error: {}", e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| TransportError::Request {
            url: url.to_string(),
            reason: "Request failed after all retries".to_string(),
        }))
    }

    fn describe(&self, path: &str) -> String {
        self.endpoint(path, RequestKind::Read)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| path.to_string())
    }
}
