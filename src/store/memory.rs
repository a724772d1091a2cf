//! In-memory secret store
//!
//! Answers list and read requests from an in-process tree using the same
//! JSON shapes as the HTTP store, so the walker and collector run unchanged
//! against it. Failures and latency can be injected per path.

use crate::error::{TransportError, TransportResult};
use crate::store::{RequestKind, SecretStore, StoreResponse};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory `SecretStore`
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Directory path ("/", "/a/") -> child names
    dirs: HashMap<String, BTreeSet<String>>,
    /// Leaf path -> field map
    leaves: HashMap<String, BTreeMap<String, String>>,
    /// Canned responses that replace the tree's answer
    overrides: HashMap<(String, RequestKind), StoreResponse>,
    /// Requests that fail at the transport level
    broken: HashSet<(String, RequestKind)>,
    /// Artificial latency per path
    delays: HashMap<String, Duration>,
    requests: AtomicUsize,
    log: Mutex<Vec<(String, RequestKind)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a leaf and every directory above it
    pub fn with_secret<K, V>(mut self, path: &str, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let leaf = format!("/{}", path.trim_start_matches('/'));
        self.register_parents(&leaf);
        self.leaves.insert(
            leaf,
            fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        );
        self
    }

    /// Add an empty directory (and its parents)
    pub fn with_dir(mut self, path: &str) -> Self {
        let dir = format!("/{}", path.trim_matches('/'));
        let dir = if dir == "/" { dir } else { format!("{}/", dir) };
        self.register_parents(&dir);
        self.dirs.entry(dir).or_default();
        self
    }

    /// Add a raw child name under a directory, bypassing path checks
    pub fn with_child(mut self, dir: &str, child: &str) -> Self {
        self.dirs
            .entry(dir.to_string())
            .or_default()
            .insert(child.to_string());
        self
    }

    /// Answer a request with a fixed status and body
    pub fn with_response(mut self, path: &str, kind: RequestKind, status: u16, body: &str) -> Self {
        self.overrides.insert(
            (path.to_string(), kind),
            StoreResponse {
                status,
                body: body.as_bytes().to_vec(),
            },
        );
        self
    }

    /// Fail a request at the transport level
    pub fn with_transport_failure(mut self, path: &str, kind: RequestKind) -> Self {
        self.broken.insert((path.to_string(), kind));
        self
    }

    /// Delay every request for a path
    pub fn with_delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(path.to_string(), delay);
        self
    }

    /// Total requests served
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Number of requests served for one path and kind
    pub fn requests_for(&self, path: &str, kind: RequestKind) -> usize {
        self.log
            .lock()
            .map(|log| log.iter().filter(|(p, k)| p == path && *k == kind).count())
            .unwrap_or(0)
    }

    fn register_parents(&mut self, path: &str) {
        let mut parent = String::from("/");
        let trimmed = path.trim_start_matches('/');
        let is_dir = trimmed.ends_with('/');
        let segments: Vec<&str> = trimmed.trim_end_matches('/').split('/').collect();

        for (i, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                break;
            }
            let last = i + 1 == segments.len();
            let child = if last && !is_dir {
                segment.to_string()
            } else {
                format!("{}/", segment)
            };
            self.dirs.entry(parent.clone()).or_default().insert(child.clone());
            parent.push_str(&child);
        }
    }

    fn answer(&self, path: &str, kind: RequestKind) -> StoreResponse {
        let found = match kind {
            RequestKind::List => self
                .dirs
                .get(path)
                .map(|children| json!({ "data": { "keys": children } })),
            RequestKind::Read => self
                .leaves
                .get(path)
                .map(|fields| json!({ "data": fields })),
        };

        match found {
            Some(body) => StoreResponse {
                status: 200,
                body: body.to_string().into_bytes(),
            },
            None => StoreResponse {
                status: 404,
                body: json!({ "errors": [] }).to_string().into_bytes(),
            },
        }
    }
}

#[async_trait::async_trait]
impl SecretStore for MemoryStore {
    async fn request(&self, path: &str, kind: RequestKind) -> TransportResult<StoreResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.log.lock() {
            log.push((path.to_string(), kind));
        }

        if let Some(delay) = self.delays.get(path) {
            tokio::time::sleep(*delay).await;
        }

        let key = (path.to_string(), kind);
        if self.broken.contains(&key) {
            return Err(TransportError::ConnectionFailed {
                url: self.describe(path),
                reason: "Injected transport failure".to_string(),
            });
        }

        if let Some(response) = self.overrides.get(&key) {
            return Ok(response.clone());
        }

        Ok(self.answer(path, kind))
    }

    fn describe(&self, path: &str) -> String {
        format!("memory://{}", path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{parse_listing, parse_payload};

    #[tokio::test]
    async fn test_parents_registered() {
        let store = MemoryStore::new()
            .with_secret("/b", [("x", "1")])
            .with_secret("/a/c", [("y", "2")]);

        let root = store.request("/", RequestKind::List).await.unwrap();
        let listing = parse_listing("/", &root).unwrap();
        assert_eq!(listing.children, vec!["a/".to_string(), "b".to_string()]);

        let sub = store.request("/a/", RequestKind::List).await.unwrap();
        assert_eq!(parse_listing("/a/", &sub).unwrap().children, vec!["c".to_string()]);

        let leaf = store.request("/a/c", RequestKind::Read).await.unwrap();
        let payload = parse_payload("/a/c", &leaf).unwrap();
        assert_eq!(payload.fields.get("y").map(String::as_str), Some("2"));

        assert_eq!(store.request_count(), 3);
        assert_eq!(store.requests_for("/a/", RequestKind::List), 1);
    }

    #[tokio::test]
    async fn test_empty_dir() {
        let store = MemoryStore::new().with_dir("/empty/");
        let root = store.request("/", RequestKind::List).await.unwrap();
        assert_eq!(parse_listing("/", &root).unwrap().children, vec!["empty/".to_string()]);

        let empty = store.request("/empty/", RequestKind::List).await.unwrap();
        assert_eq!(empty.status, 200);
        assert!(parse_listing("/empty/", &empty).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new()
            .with_secret("/b", [("x", "1")])
            .with_transport_failure("/b", RequestKind::Read)
            .with_response("/", RequestKind::List, 500, "boom");

        assert!(store.request("/b", RequestKind::Read).await.is_err());
        assert_eq!(store.request("/", RequestKind::List).await.unwrap().status, 500);
    }
}
