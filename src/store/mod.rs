//! Secret store access
//!
//! The request gateway is the only component that talks to the store. The
//! tree walker and the secret collector call it through the `SecretStore`
//! trait and interpret the raw response themselves.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐
//! │ TreeWalker   │   │ SecretCollector  │
//! │ (List)       │   │ (Read)           │
//! └──────┬───────┘   └────────┬─────────┘
//!        │                    │
//!        └─────────┬──────────┘
//!                  ▼
//! ┌─────────────────────────────────────────┐
//! │          dyn SecretStore                │
//! │  HttpGateway: X-Vault-Token, CA bundle, │
//! │  in-flight semaphore, timeout, retries  │
//! │  MemoryStore: in-process tree           │
//! └─────────────────────────────────────────┘
//! ```

mod gateway;
pub mod memory;
pub mod types;

pub use gateway::{HttpGateway, HttpGatewayBuilder, TOKEN_HEADER};
pub use memory::MemoryStore;
pub use types::{parse_listing, parse_payload, DirectoryListing, LeafPayload};

use crate::error::{TransportError, TransportResult};

/// How the caller intends to interpret the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Directory enumeration (`?list=true`)
    List,
    /// Plain read of a leaf
    Read,
}

/// Raw store response
#[derive(Debug, Clone)]
pub struct StoreResponse {
    /// HTTP status code
    pub status: u16,

    /// Response body
    pub body: Vec<u8>,
}

impl StoreResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Trait for store gateways
///
/// Implementations add authentication and transport concerns; they do not
/// inspect the body.
#[async_trait::async_trait]
pub trait SecretStore: Send + Sync {
    /// Issue one request for a store path (relative to the run's root)
    async fn request(&self, path: &str, kind: RequestKind) -> TransportResult<StoreResponse>;

    /// Human readable location of a store path, for logging
    fn describe(&self, path: &str) -> String {
        path.to_string()
    }
}

/// Map a reqwest error onto the transport taxonomy
pub(crate) fn classify_reqwest_error(url: &str, err: reqwest::Error, attempts: u32) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
            attempts,
        }
    } else if err.is_connect() {
        TransportError::ConnectionFailed {
            url: url.to_string(),
            reason: err.to_string(),
        }
    } else {
        TransportError::Request {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

// Re-export async_trait for implementors
pub use async_trait::async_trait;
