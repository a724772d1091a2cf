//! Authentication token acquisition
//!
//! A run needs exactly one token. It either comes from a pre-issued
//! override (the exchange is never contacted) or from a single GET to the
//! exchange endpoint `/group/token/<group>`, whose body is the token.

use crate::config::TokenSource;
use crate::error::AuthError;
use crate::store::classify_reqwest_error;
use std::fmt;
use std::time::Duration;
use tracing::info;
use zeroize::Zeroizing;

/// Opaque store token, valid for the whole run
///
/// The value is wiped from memory on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(Zeroizing<String>);

impl AuthToken {
    pub fn new(token: String) -> Self {
        Self(Zeroizing::new(token))
    }

    /// Raw token value, for the request header only
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// Resolve the run's token from its configured source
pub async fn acquire_token(source: &TokenSource, timeout: Duration) -> Result<AuthToken, AuthError> {
    match source {
        TokenSource::Override(token) => {
            info!("Using pre-issued store token, skipping exchange");
            Ok(token.clone())
        }
        TokenSource::Exchange(url) => exchange_token(url, timeout).await,
    }
}

async fn exchange_token(url: &url::Url, timeout: Duration) -> Result<AuthToken, AuthError> {
    info!("Requesting store token from {}", url);

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| crate::error::TransportError::ClientBuild(e.to_string()))?;

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| classify_reqwest_error(url.as_str(), e, 1))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AuthError::Rejected {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = Zeroizing::new(
        response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(url.as_str(), e, 1))?,
    );

    let token = body.trim();
    if token.is_empty() {
        return Err(AuthError::EmptyToken {
            url: url.to_string(),
        });
    }

    Ok(AuthToken::new(token.to_string()))
}
