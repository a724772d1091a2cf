//! Error types for secrets-walker
//!
//! This module defines the error hierarchy for one materialization run:
//! - Configuration errors (missing or unparseable store address, bad bounds)
//! - Authentication exchange errors
//! - Transport errors from the request gateway
//! - Discovery errors (tree walk) and fetch errors (leaf reads)
//! - Sink write errors
//!
//! Every error is fatal for the run. Nothing is retried here; bounded
//! retries for transient transport failures live in the gateway.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a materialization run
#[derive(Error, Debug)]
pub enum MaterializerError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Authentication exchange errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Tree walk errors
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Leaf read errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Sink write errors
    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    /// Transport errors outside of discovery or collection
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// No leaves under the root while at least one is required
    #[error("No secrets found under '{root}'")]
    EmptyResult { root: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Store address not configured
    #[error("Store address is not set (use --vault-addr or $VAULT_ADDR)")]
    MissingStoreAddress,

    /// Store address could not be parsed
    #[error("Invalid store address '{addr}': {reason}")]
    InvalidStoreAddress { addr: String, reason: String },

    /// Group/namespace identifier not configured
    #[error("Secret group is not set (use --group or $VAULT_GROUP)")]
    MissingGroup,

    /// Invalid group identifier
    #[error("Invalid secret group '{group}': {reason}")]
    InvalidGroup { group: String, reason: String },

    /// Invalid secret engine mount
    #[error("Invalid mount '{mount}': must be one or more non-empty path segments")]
    InvalidMount { mount: String },

    /// Neither a token override nor an exchange host was given
    #[error("Exchange host is not set and no token override was provided (use --exchange-host or $EXCHANGE_HOST)")]
    MissingExchangeHost,

    /// Exchange address could not be parsed
    #[error("Invalid exchange address '{addr}': {reason}")]
    InvalidExchangeAddress { addr: String, reason: String },

    /// Trust anchor file missing or unreadable
    #[error("Cannot load CA certificate '{path}': {reason}")]
    InvalidCaCert { path: PathBuf, reason: String },

    /// In-flight limit out of range
    #[error("Invalid in-flight limit {count}: must be between 1 and {max}")]
    InvalidInFlight { count: usize, max: usize },

    /// Depth limit out of range
    #[error("Invalid max depth {depth}: must be between 1 and {max}")]
    InvalidMaxDepth { depth: usize, max: usize },

    /// Timeout must be positive
    #[error("Invalid timeout {secs}s: must be at least 1 second")]
    InvalidTimeout { secs: u64 },

    /// Output directory unusable
    #[error("Invalid output directory '{path}': {reason}")]
    InvalidOutputDir { path: PathBuf, reason: String },
}

/// Authentication exchange errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Exchange endpoint answered with a non-success status
    #[error("Token exchange at '{url}' returned status {status}")]
    Rejected { url: String, status: u16 },

    /// Exchange endpoint answered with an empty body
    #[error("Token exchange at '{url}' returned an empty token")]
    EmptyToken { url: String },

    /// Exchange request failed
    #[error("Token exchange failed: {0}")]
    Transport(#[from] TransportError),
}

/// Transport-level errors from the request gateway
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Request URL could not be built
    #[error("Invalid request URL for '{path}': {reason}")]
    InvalidUrl { path: String, reason: String },

    /// HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// Connection to the store failed
    #[error("Failed to connect to '{url}': {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// Request did not complete in time
    #[error("Request to '{url}' timed out after {attempts} attempts")]
    Timeout { url: String, attempts: u32 },

    /// Any other request or body read failure
    #[error("Request to '{url}' failed: {reason}")]
    Request { url: String, reason: String },
}

impl TransportError {
    /// Check if this error is transient and the request may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionFailed { .. } | TransportError::Timeout { .. }
        )
    }
}

/// Errors discovering leaves under a directory
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// List request failed at the transport level
    #[error("Failed to list '{path}': {source}")]
    Transport {
        path: String,
        #[source]
        source: TransportError,
    },

    /// Store answered the list request with an error status
    #[error("Listing '{path}' returned status {status}: {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },

    /// Response body lacks an enumerable child-name set
    #[error("Malformed listing for '{path}': {reason}")]
    MalformedListing { path: String, reason: String },

    /// Child name cannot be joined onto its parent
    #[error("Invalid child '{child}' under '{path}'")]
    InvalidChild { path: String, child: String },

    /// Hierarchy deeper than the configured guard
    #[error("Directory '{path}' exceeds max depth {max_depth}")]
    DepthExceeded { path: String, max_depth: usize },
}

/// Errors fetching one leaf's payload
#[derive(Error, Debug)]
pub enum FetchError {
    /// Read request failed at the transport level
    #[error("Failed to read '{path}': {source}")]
    Transport {
        path: String,
        #[source]
        source: TransportError,
    },

    /// Store answered the read request with an error status
    #[error("Reading '{path}' returned status {status}: {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },

    /// Response body is not a field map
    #[error("Malformed payload for '{path}': {reason}")]
    MalformedPayload { path: String, reason: String },
}

/// Sink write errors
#[derive(Error, Debug)]
pub enum WriteError {
    /// Field name is not usable as a file name
    #[error("Refusing to write secret with invalid name '{name}'")]
    InvalidName { name: String },

    /// Writing the file failed
    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writer task stopped before all fields were delivered
    #[error("Secret writer stopped unexpectedly")]
    WriterClosed,
}

/// Result type alias for MaterializerError
pub type Result<T> = std::result::Result<T, MaterializerError>;

/// Result type alias for TransportError
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Result type alias for DiscoveryError
pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;
