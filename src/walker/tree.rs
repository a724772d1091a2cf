//! Tree walker - recursive concurrent discovery
//!
//! Lists a directory, records every non-directory child as a leaf and
//! recurses into every child ending in `/`. Sibling subtrees are walked
//! concurrently; the first failing subtree fails the whole walk.
//!
//! Architecture:
//! ```text
//! discover_leaves("/")
//! │
//! ├── LIST /        → ["a/", "b"]
//! │   ├── "b"       → leaf /b
//! │   └── "a/"      → LIST /a/ → ["c"] → leaf /a/c
//! │
//! └── try_join_all(subtrees) → union of leaves, or first error
//! ```

use crate::context::RunContext;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::store::types::is_directory;
use crate::store::{parse_listing, RequestKind};
use futures::future::{try_join_all, BoxFuture, FutureExt};
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use tracing::{debug, info};

/// Directories already listed during one walk
type Visited = Mutex<HashSet<String>>;

/// Recursive leaf discovery over one store
pub struct TreeWalker {
    ctx: RunContext,
}

impl TreeWalker {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    /// Discover every leaf path under `root`
    ///
    /// `root` is normalized to start and end with `/`. Leaves are returned
    /// as full paths (`root + child + ...`).
    pub async fn discover_leaves(&self, root: &str) -> DiscoveryResult<BTreeSet<String>> {
        let root = normalize_dir(root);
        let visited = Visited::default();
        self.walk(&visited, root, 0).await
    }

    fn walk<'a>(
        &'a self,
        visited: &'a Visited,
        dir: String,
        depth: usize,
    ) -> BoxFuture<'a, DiscoveryResult<BTreeSet<String>>> {
        async move {
            if depth > self.ctx.max_depth() {
                return Err(DiscoveryError::DepthExceeded {
                    path: dir,
                    max_depth: self.ctx.max_depth(),
                });
            }

            // Each directory is listed at most once per walk
            if !mark_visited(visited, &dir) {
                debug!("Skipping already visited directory {}", dir);
                return Ok(BTreeSet::new());
            }

            let response = self
                .ctx
                .store()
                .request(&dir, RequestKind::List)
                .await
                .map_err(|source| DiscoveryError::Transport {
                    path: dir.clone(),
                    source,
                })?;

            let listing = parse_listing(&dir, &response)?;
            let counters = self.ctx.counters();
            counters.dirs_listed.fetch_add(1, Ordering::Relaxed);

            debug!("Listed {} -> {} children", dir, listing.children.len());

            let mut leaves = BTreeSet::new();
            let mut subtrees = Vec::new();

            for child in listing.children {
                validate_child(&dir, &child)?;
                let path = format!("{}{}", dir, child);

                if is_directory(&child) {
                    info!("Recursing into {}", path);
                    subtrees.push(self.walk(visited, path, depth + 1));
                } else if leaves.insert(path.clone()) {
                    info!("Adding secret key {}", path);
                    counters.leaves_found.fetch_add(1, Ordering::Relaxed);
                }
            }

            for subtree in try_join_all(subtrees).await? {
                leaves.extend(subtree);
            }

            Ok(leaves)
        }
        .boxed()
    }
}

fn mark_visited(visited: &Visited, dir: &str) -> bool {
    match visited.lock() {
        Ok(mut visited) => visited.insert(dir.to_string()),
        Err(poisoned) => poisoned.into_inner().insert(dir.to_string()),
    }
}

/// Ensure a directory path starts and ends with `/`
pub fn normalize_dir(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

/// Reject child names that would escape or alias their parent
fn validate_child(dir: &str, child: &str) -> DiscoveryResult<()> {
    let name = child.strip_suffix('/').unwrap_or(child);
    let valid = !name.is_empty()
        && !child.starts_with('/')
        && name.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..");

    if valid {
        Ok(())
    } else {
        Err(DiscoveryError::InvalidChild {
            path: dir.to_string(),
            child: child.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn walker(store: MemoryStore) -> (TreeWalker, Arc<MemoryStore>) {
        let store = Arc::new(store);
        let ctx = RunContext::new(store.clone(), 16);
        (TreeWalker::new(ctx), store)
    }

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_discover_nested_tree() {
        let (walker, store) = walker(
            MemoryStore::new()
                .with_secret("/b", [("x", "1")])
                .with_secret("/a/c", [("y", "2")]),
        );

        let leaves = walker.discover_leaves("/").await.unwrap();
        assert_eq!(leaves, set(&["/b", "/a/c"]));
        assert_eq!(store.requests_for("/", RequestKind::List), 1);
        assert_eq!(store.requests_for("/a/", RequestKind::List), 1);
    }

    #[tokio::test]
    async fn test_discover_deep_and_wide() {
        let (walker, _) = walker(
            MemoryStore::new()
                .with_secret("/x/y/z/w/leaf", [("k", "v")])
                .with_secret("/x/y/other", [("k", "v")])
                .with_secret("/p/q", [("k", "v")])
                .with_secret("/p/r", [("k", "v")])
                .with_secret("/top", [("k", "v")]),
        );

        let leaves = walker.discover_leaves("/").await.unwrap();
        assert_eq!(
            leaves,
            set(&["/x/y/z/w/leaf", "/x/y/other", "/p/q", "/p/r", "/top"])
        );
    }

    #[tokio::test]
    async fn test_discover_empty_root() {
        let (walker, _) = walker(MemoryStore::new().with_dir("/"));
        let leaves = walker.discover_leaves("/").await.unwrap();
        assert!(leaves.is_empty());
    }

    #[tokio::test]
    async fn test_discover_missing_root_is_empty() {
        let (walker, _) = walker(MemoryStore::new());
        let leaves = walker.discover_leaves("/").await.unwrap();
        assert!(leaves.is_empty());
    }

    #[tokio::test]
    async fn test_discover_empty_subdirectory() {
        let (walker, _) = walker(
            MemoryStore::new()
                .with_dir("/empty/")
                .with_secret("/b", [("x", "1")]),
        );
        let leaves = walker.discover_leaves("/").await.unwrap();
        assert_eq!(leaves, set(&["/b"]));
    }

    #[tokio::test]
    async fn test_discover_subtree_root() {
        let (walker, _) = walker(
            MemoryStore::new()
                .with_secret("/a/c", [("y", "2")])
                .with_secret("/b", [("x", "1")]),
        );
        let leaves = walker.discover_leaves("a").await.unwrap();
        assert_eq!(leaves, set(&["/a/c"]));
    }

    #[tokio::test]
    async fn test_walker_reuse_rediscovers_tree() {
        let (walker, store) = walker(
            MemoryStore::new()
                .with_secret("/b", [("x", "1")])
                .with_secret("/a/c", [("y", "2")]),
        );

        let first = walker.discover_leaves("/").await.unwrap();
        let second = walker.discover_leaves("/").await.unwrap();
        let subtree = walker.discover_leaves("/a/").await.unwrap();

        assert_eq!(first, set(&["/b", "/a/c"]));
        assert_eq!(second, first);
        assert_eq!(subtree, set(&["/a/c"]));
        assert_eq!(store.requests_for("/", RequestKind::List), 2);
        assert_eq!(store.requests_for("/a/", RequestKind::List), 3);
    }

    #[tokio::test]
    async fn test_malformed_subtree_fails_walk() {
        let (walker, _) = walker(
            MemoryStore::new()
                .with_secret("/a/c", [("y", "2")])
                .with_secret("/b", [("x", "1")])
                .with_response("/a/", RequestKind::List, 200, r#"{"data":{}}"#),
        );
        let err = walker.discover_leaves("/").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::MalformedListing { ref path, .. } if path == "/a/"));
    }

    #[tokio::test]
    async fn test_transport_failure_fails_walk() {
        let (walker, _) = walker(
            MemoryStore::new()
                .with_secret("/a/c", [("y", "2")])
                .with_secret("/d/e", [("z", "3")])
                .with_delay("/d/", Duration::from_millis(50))
                .with_transport_failure("/a/", RequestKind::List),
        );
        let err = walker.discover_leaves("/").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Transport { ref path, .. } if path == "/a/"));
    }

    #[tokio::test]
    async fn test_depth_guard() {
        let store = Arc::new(MemoryStore::new().with_secret("/a/b/c/d", [("k", "v")]));
        let walker = TreeWalker::new(RunContext::new(store, 2));
        let err = walker.discover_leaves("/").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::DepthExceeded { ref path, max_depth: 2 } if path == "/a/b/c/"));
    }

    /// Store whose every directory contains itself again
    struct EchoStore;

    #[async_trait::async_trait]
    impl crate::store::SecretStore for EchoStore {
        async fn request(
            &self,
            _path: &str,
            _kind: RequestKind,
        ) -> crate::error::TransportResult<crate::store::StoreResponse> {
            Ok(crate::store::StoreResponse {
                status: 200,
                body: br#"{"data":{"keys":["loop/","leaf"]}}"#.to_vec(),
            })
        }
    }

    #[tokio::test]
    async fn test_self_referencing_listing_terminates() {
        let walker = TreeWalker::new(RunContext::new(Arc::new(EchoStore), 8));
        let err = walker.discover_leaves("/").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::DepthExceeded { max_depth: 8, .. }));
    }

    #[tokio::test]
    async fn test_invalid_child_rejected() {
        let (walker, _) = walker(MemoryStore::new().with_dir("/").with_child("/", "../etc"));
        let err = walker.discover_leaves("/").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidChild { .. }));
    }

    #[test]
    fn test_normalize_dir() {
        assert_eq!(normalize_dir("/"), "/");
        assert_eq!(normalize_dir(""), "/");
        assert_eq!(normalize_dir("a"), "/a/");
        assert_eq!(normalize_dir("/a/b/"), "/a/b/");
    }

    #[test]
    fn test_validate_child() {
        assert!(validate_child("/", "a/").is_ok());
        assert!(validate_child("/", "b").is_ok());
        assert!(validate_child("/", "").is_err());
        assert!(validate_child("/", "/").is_err());
        assert!(validate_child("/", "/abs").is_err());
        assert!(validate_child("/", "./").is_err());
        assert!(validate_child("/", "a//b").is_err());
    }
}
