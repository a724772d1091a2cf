//! Store response schemas
//!
//! List responses must carry `data.keys` (an array of child names); read
//! responses carry `data` as a map of field name to string value. Anything
//! else is rejected with a typed error instead of being probed loosely.

use crate::error::{DiscoveryError, FetchError};
use crate::store::StoreResponse;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Child names of one directory, as returned by one list call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    pub children: Vec<String>,
}

impl DirectoryListing {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Field map of one leaf
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafPayload {
    pub fields: BTreeMap<String, String>,
}

impl LeafPayload {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

#[derive(Debug, Deserialize)]
struct ListBody {
    data: Option<ListData>,
}

#[derive(Debug, Deserialize)]
struct ListData {
    keys: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ReadBody {
    #[serde(default)]
    data: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Check whether a child name marks a sub-directory
pub fn is_directory(name: &str) -> bool {
    name.ends_with('/')
}

/// Interpret a list response for `path`
///
/// A 404 is an empty directory.
pub fn parse_listing(path: &str, response: &StoreResponse) -> Result<DirectoryListing, DiscoveryError> {
    if response.is_not_found() {
        return Ok(DirectoryListing::default());
    }

    if !response.is_success() {
        return Err(DiscoveryError::Status {
            path: path.to_string(),
            status: response.status,
            message: error_message(&response.body),
        });
    }

    let malformed = |reason: String| DiscoveryError::MalformedListing {
        path: path.to_string(),
        reason,
    };

    let body: ListBody = serde_json::from_slice(&response.body).map_err(|e| malformed(e.to_string()))?;

    let keys = body
        .data
        .and_then(|d| d.keys)
        .ok_or_else(|| malformed("Cannot find .data.keys in response".to_string()))?;

    Ok(DirectoryListing { children: keys })
}

/// Interpret a read response for `path`
///
/// A 404 or a missing/null `data` is an absent payload (zero fields).
pub fn parse_payload(path: &str, response: &StoreResponse) -> Result<LeafPayload, FetchError> {
    if response.is_not_found() {
        return Ok(LeafPayload::default());
    }

    if !response.is_success() {
        return Err(FetchError::Status {
            path: path.to_string(),
            status: response.status,
            message: error_message(&response.body),
        });
    }

    // 204 No Content
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(LeafPayload::default());
    }

    let body: ReadBody =
        serde_json::from_slice(&response.body).map_err(|e| FetchError::MalformedPayload {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

    Ok(LeafPayload {
        fields: body.data.unwrap_or_default(),
    })
}

/// Best-effort summary of a store error body
fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join("; "),
        _ => String::from_utf8_lossy(body).trim().chars().take(200).collect(),
    }
}
