//! Crate location: which crates, at any depth, contain a track.
//!
//! The crate tree's shape is always known but per-crate membership may have to
//! be fetched through a `CrateLoader`. Traversal uses an explicit worklist so
//! the depth-first, left-to-right order is fixed up front; loads can then run
//! with bounded concurrency without changing the order of the report.

use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::pin::pin;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{MatchError, Result};
use crate::models::{CrateMembership, CrateNode, TrackId, CRATE_PATH_SEPARATOR};

/// Sequential loads unless the caller asks for more
pub const DEFAULT_LOAD_CONCURRENCY: usize = 1;

/// Read-only accessor for crate membership, owned by the library collaborator.
#[async_trait]
pub trait CrateLoader: Send + Sync {
    async fn load_crate_tracks(&self, crate_id: &str) -> anyhow::Result<Vec<TrackId>>;
}

/// Loads membership from `<dir>/<crate_id>.json`, a JSON array of track ids.
pub struct JsonDirCrateLoader {
    dir: PathBuf,
}

impl JsonDirCrateLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl CrateLoader for JsonDirCrateLoader {
    async fn load_crate_tracks(&self, crate_id: &str) -> anyhow::Result<Vec<TrackId>> {
        if crate_id.is_empty() || crate_id.contains(['/', '\\']) || crate_id.contains("..") {
            bail!("Refusing to load crate with unsafe id '{}'", crate_id);
        }
        let path = self.dir.join(format!("{}.json", crate_id));
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Read crate membership {}", path.display()))?;
        let ids: Vec<TrackId> = serde_json::from_str(&content)
            .with_context(|| format!("Parse crate membership {}", path.display()))?;
        Ok(ids)
    }
}

/// A node scheduled for inspection, with its breadcrumb.
struct Visit<'t> {
    node: &'t CrateNode,
    path: String,
}

/// Pre-order, left-to-right walk of the forest.
fn depth_first(tree: &[CrateNode]) -> Vec<Visit<'_>> {
    let mut order = Vec::new();
    let mut stack: Vec<Visit<'_>> = tree
        .iter()
        .rev()
        .map(|node| Visit {
            node,
            path: node.name.clone(),
        })
        .collect();

    while let Some(visit) = stack.pop() {
        for child in visit.node.children.iter().rev() {
            stack.push(Visit {
                node: child,
                path: format!("{}{}{}", visit.path, CRATE_PATH_SEPARATOR, child.name),
            });
        }
        order.push(visit);
    }
    order
}

/// Every crate containing `track_id`, in depth-first order, loading
/// membership sequentially.
pub async fn find_track_crates(
    track_id: &str,
    tree: &[CrateNode],
    loader: &dyn CrateLoader,
    cancel: &CancellationToken,
) -> Result<Vec<CrateMembership>> {
    find_track_crates_with(track_id, tree, loader, cancel, DEFAULT_LOAD_CONCURRENCY).await
}

/// `find_track_crates` with up to `concurrency` membership loads in flight.
///
/// A crate whose load fails is logged and treated as not containing the track;
/// its children are still visited. Cancelling drops any in-flight loads.
pub async fn find_track_crates_with(
    track_id: &str,
    tree: &[CrateNode],
    loader: &dyn CrateLoader,
    cancel: &CancellationToken,
    concurrency: usize,
) -> Result<Vec<CrateMembership>> {
    if cancel.is_cancelled() {
        return Err(MatchError::Cancelled);
    }
    if track_id.is_empty() || tree.is_empty() {
        return Ok(Vec::new());
    }

    let visits = depth_first(tree);
    let total = visits.len();

    let lookups = stream::iter(visits.into_iter().map(|visit| async move {
        let contains = match &visit.node.track_ids {
            Some(ids) => Some(ids.iter().any(|id| id == track_id)),
            None => match loader.load_crate_tracks(&visit.node.id).await {
                Ok(ids) => Some(ids.iter().any(|id| id == track_id)),
                Err(e) => {
                    warn!(
                        crate_id = %visit.node.id,
                        crate_name = %visit.node.name,
                        "Failed to load crate membership, skipping: {:#}",
                        e
                    );
                    None
                }
            },
        };
        (visit, contains)
    }))
    .buffered(concurrency.max(1));
    let mut lookups = pin!(lookups);

    let mut memberships = Vec::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MatchError::Cancelled),
            next = lookups.next() => next,
        };
        let Some((visit, contains)) = next else {
            break;
        };
        if contains == Some(true) {
            memberships.push(CrateMembership {
                id: visit.node.id.clone(),
                name: visit.node.name.clone(),
                full_path: visit.path,
            });
        }
    }

    debug!(track_id, crates = total, found = memberships.len(), "crate search complete");
    Ok(memberships)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MapLoader {
        memberships: HashMap<String, Vec<String>>,
        failing: HashSet<String>,
        delays_ms: HashMap<String, u64>,
        calls: Mutex<Vec<String>>,
    }

    impl MapLoader {
        fn with(mut self, crate_id: &str, ids: &[&str]) -> Self {
            self.memberships
                .insert(crate_id.to_string(), ids.iter().map(|s| s.to_string()).collect());
            self
        }

        fn failing(mut self, crate_id: &str) -> Self {
            self.failing.insert(crate_id.to_string());
            self
        }

        fn delayed(mut self, crate_id: &str, ms: u64) -> Self {
            self.delays_ms.insert(crate_id.to_string(), ms);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CrateLoader for MapLoader {
        async fn load_crate_tracks(&self, crate_id: &str) -> anyhow::Result<Vec<TrackId>> {
            self.calls.lock().unwrap().push(crate_id.to_string());
            if let Some(ms) = self.delays_ms.get(crate_id) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            if self.failing.contains(crate_id) {
                bail!("disk error");
            }
            Ok(self.memberships.get(crate_id).cloned().unwrap_or_default())
        }
    }

    struct PendingLoader;

    #[async_trait]
    impl CrateLoader for PendingLoader {
        async fn load_crate_tracks(&self, _crate_id: &str) -> anyhow::Result<Vec<TrackId>> {
            std::future::pending().await
        }
    }

    fn paths(memberships: &[CrateMembership]) -> Vec<&str> {
        memberships.iter().map(|m| m.full_path.as_str()).collect()
    }

    #[tokio::test]
    async fn test_two_level_path() {
        let tree = vec![CrateNode::new("p", "Parent").with_child(CrateNode::new("c", "Child"))];
        let loader = MapLoader::default().with("p", &["other"]).with("c", &["target"]);

        let result = find_track_crates("target", &tree, &loader, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            result,
            vec![CrateMembership {
                id: "c".to_string(),
                name: "Child".to_string(),
                full_path: "Parent › Child".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_depth_first_order_and_inline_membership() {
        let tree = vec![
            CrateNode::new("a", "House")
                .with_tracks(["t"])
                .with_child(
                    CrateNode::new("a1", "Deep").with_child(CrateNode::new("a1x", "Late Night")),
                )
                .with_child(CrateNode::new("a2", "Tech").with_tracks(["t"])),
            CrateNode::new("b", "Warmup"),
        ];
        let loader = MapLoader::default().with("a1x", &["t"]).with("b", &["t"]);

        let result = find_track_crates("t", &tree, &loader, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            paths(&result),
            vec!["House", "House › Deep › Late Night", "House › Tech", "Warmup"]
        );
        // Inline memberships are never reloaded
        assert_eq!(loader.calls(), vec!["a1", "a1x", "b"]);
    }

    #[tokio::test]
    async fn test_failed_load_is_skipped() {
        let tree = vec![
            CrateNode::new("p", "Parent").with_child(CrateNode::new("c", "Child")),
            CrateNode::new("s", "Sibling"),
        ];
        let loader = MapLoader::default()
            .failing("p")
            .with("c", &["t"])
            .with("s", &["t"]);

        let result = find_track_crates("t", &tree, &loader, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(paths(&result), vec!["Parent › Child", "Sibling"]);
    }

    #[tokio::test]
    async fn test_concurrent_loads_keep_order() {
        let tree = vec![
            CrateNode::new("a", "A"),
            CrateNode::new("b", "B"),
            CrateNode::new("c", "C"),
        ];
        let loader = MapLoader::default()
            .with("a", &["t"])
            .with("b", &["t"])
            .with("c", &["t"])
            .delayed("a", 60)
            .delayed("b", 30);

        let result = find_track_crates_with("t", &tree, &loader, &CancellationToken::new(), 3)
            .await
            .unwrap();
        assert_eq!(paths(&result), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let tree = vec![CrateNode::new("a", "A")];
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = find_track_crates("t", &tree, &MapLoader::default(), &cancel).await;
        assert!(matches!(result, Err(MatchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_abandons_in_flight_load() {
        let tree = vec![CrateNode::new("a", "A")];
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = find_track_crates("t", &tree, &PendingLoader, &cancel).await;
        assert!(matches!(result, Err(MatchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_empty_inputs() {
        let loader = MapLoader::default();
        let cancel = CancellationToken::new();
        assert!(find_track_crates("t", &[], &loader, &cancel).await.unwrap().is_empty());
        let tree = vec![CrateNode::new("a", "A").with_tracks(["t"])];
        assert!(find_track_crates("", &tree, &loader, &cancel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_dir_loader() {
        let dir = std::env::temp_dir().join(format!("trackmatch-crates-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("c1.json"), r#"["t1", "t2"]"#).unwrap();
        std::fs::write(dir.join("broken.json"), "not json").unwrap();

        let loader = JsonDirCrateLoader::new(&dir);
        assert_eq!(loader.load_crate_tracks("c1").await.unwrap(), vec!["t1", "t2"]);
        assert!(loader.load_crate_tracks("broken").await.is_err());
        assert!(loader.load_crate_tracks("missing").await.is_err());
        assert!(loader.load_crate_tracks("../c1").await.is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
