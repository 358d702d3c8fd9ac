//! Asset mutator adapter: reads and atomically mutates persisted ability
//! graphs.
//!
//! The engine core only needs the `AssetMutator` seam; `JsonAssetStore`
//! is the file-backed implementation used by the CLI, one JSON graph
//! file per asset id.
//!
//! Asset file shape (<root>/<asset_id>.json):
//! {
//!   "ability": "Fireball",
//!   "nodes": [
//!     {
//!       "node_id": "3f2a...",
//!       "key": "3f2a...",        // absent for hand-authored nodes
//!       "authored": false,
//!       "role": "tagcheck",
//!       "content": { ... }
//!     }
//!   ]
//! }
//!
//! `apply` is atomic per asset: the whole new node list is staged in
//! memory and written via temp-file + rename, so either every operation
//! lands or none do.

use crate::graph::key::SynthesisKey;
use crate::graph::node::ExistingGraphNode;
use crate::reconcile::{EditOperation, PlanCounts};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::sync::{Condvar, Mutex};
use thiserror::Error;

/// Counts of operations that landed in the persisted asset.
pub type ApplyReport = PlanCounts;

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("asset `{asset_id}`: {source}")]
    Io {
        asset_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("asset `{asset_id}`: malformed asset file: {source}")]
    Malformed {
        asset_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("asset `{asset_id}`: operation references unknown node `{node_id}`")]
    UnknownNode { asset_id: String, node_id: String },

    #[error("asset `{asset_id}`: create collides with existing node `{node_id}`")]
    CreateCollision { asset_id: String, node_id: String },
}

/// The mutation capability the orchestrator consumes. Read-only until
/// `apply`; `apply` is contractually atomic per asset.
pub trait AssetMutator {
    fn read_existing(&self, asset_id: &str) -> Result<Vec<ExistingGraphNode>, ApplyError>;

    fn apply(&self, asset_id: &str, ops: &[EditOperation]) -> Result<ApplyReport, ApplyError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredAsset {
    ability: String,

    #[serde(default)]
    nodes: Vec<StoredNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredNode {
    node_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<SynthesisKey>,

    #[serde(default)]
    authored: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,

    content: Value,
}

/// File-backed asset store: one JSON graph file per asset id.
#[derive(Debug)]
pub struct JsonAssetStore {
    root: PathBuf,
}

impl JsonAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn asset_path(&self, asset_id: &str) -> PathBuf {
        self.root.join(format!("{asset_id}.json"))
    }

    fn load(&self, asset_id: &str) -> Result<StoredAsset, ApplyError> {
        let path = self.asset_path(asset_id);
        if !path.exists() {
            return Ok(StoredAsset {
                ability: asset_id.to_string(),
                nodes: Vec::new(),
            });
        }
        let text = fs::read_to_string(&path).map_err(|source| ApplyError::Io {
            asset_id: asset_id.to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ApplyError::Malformed {
            asset_id: asset_id.to_string(),
            source,
        })
    }

    fn store(&self, asset_id: &str, asset: &StoredAsset) -> Result<(), ApplyError> {
        let io = |source| ApplyError::Io {
            asset_id: asset_id.to_string(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(io)?;

        let text = serde_json::to_string_pretty(asset).map_err(|source| ApplyError::Malformed {
            asset_id: asset_id.to_string(),
            source,
        })?;

        // Temp + rename keeps the visible file whole at every instant.
        let path = self.asset_path(asset_id);
        let tmp = self.root.join(format!("{asset_id}.json.tmp"));
        fs::write(&tmp, text).map_err(io)?;
        fs::rename(&tmp, &path).map_err(io)?;
        Ok(())
    }
}

impl AssetMutator for JsonAssetStore {
    fn read_existing(&self, asset_id: &str) -> Result<Vec<ExistingGraphNode>, ApplyError> {
        let asset = self.load(asset_id)?;
        Ok(asset
            .nodes
            .into_iter()
            .map(|n| ExistingGraphNode {
                node_id: n.node_id,
                key: n.key,
                authored: n.authored,
                content: n.content,
            })
            .collect())
    }

    fn apply(&self, asset_id: &str, ops: &[EditOperation]) -> Result<ApplyReport, ApplyError> {
        let asset = self.load(asset_id)?;

        // Stage the full new node list before touching the disk.
        let mut order: Vec<String> = asset.nodes.iter().map(|n| n.node_id.clone()).collect();
        let mut nodes: BTreeMap<String, StoredNode> = asset
            .nodes
            .into_iter()
            .map(|n| (n.node_id.clone(), n))
            .collect();

        for op in ops {
            match op {
                EditOperation::Create { key, role, content } => {
                    let node_id = key.as_str().to_string();
                    if nodes.contains_key(&node_id) {
                        return Err(ApplyError::CreateCollision {
                            asset_id: asset_id.to_string(),
                            node_id,
                        });
                    }
                    order.push(node_id.clone());
                    nodes.insert(
                        node_id.clone(),
                        StoredNode {
                            node_id,
                            key: Some(key.clone()),
                            authored: false,
                            role: Some(role.clone()),
                            content: content.clone(),
                        },
                    );
                }
                EditOperation::Update {
                    node_id,
                    key,
                    content,
                } => {
                    let node = nodes.get_mut(node_id).ok_or_else(|| ApplyError::UnknownNode {
                        asset_id: asset_id.to_string(),
                        node_id: node_id.clone(),
                    })?;
                    node.key = Some(key.clone());
                    node.content = content.clone();
                }
                EditOperation::Delete { node_id, .. } => {
                    if nodes.remove(node_id).is_none() {
                        return Err(ApplyError::UnknownNode {
                            asset_id: asset_id.to_string(),
                            node_id: node_id.clone(),
                        });
                    }
                    order.retain(|id| id != node_id);
                }
                EditOperation::Preserve { node_id } => {
                    if !nodes.contains_key(node_id) {
                        return Err(ApplyError::UnknownNode {
                            asset_id: asset_id.to_string(),
                            node_id: node_id.clone(),
                        });
                    }
                }
            }
        }

        let new_nodes = order
            .iter()
            .filter_map(|id| nodes.get(id).cloned())
            .collect();

        self.store(
            asset_id,
            &StoredAsset {
                ability: asset_id.to_string(),
                nodes: new_nodes,
            },
        )?;

        Ok(PlanCounts::of(ops))
    }
}

/// Single-writer discipline for reconcile+apply: one acquisition per
/// target asset id, held for the duration of the pair, released on all
/// exit paths via the RAII guard.
#[derive(Debug, Default)]
pub struct AssetLocks {
    held: Mutex<BTreeSet<String>>,
    freed: Condvar,
}

impl AssetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `asset_id` is free, then hold it until the guard
    /// drops.
    pub fn acquire(&self, asset_id: &str) -> AssetLockGuard<'_> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        while held.contains(asset_id) {
            held = self
                .freed
                .wait(held)
                .unwrap_or_else(|e| e.into_inner());
        }
        held.insert(asset_id.to_string());
        AssetLockGuard {
            locks: self,
            asset_id: asset_id.to_string(),
        }
    }
}

pub struct AssetLockGuard<'a> {
    locks: &'a AssetLocks,
    asset_id: String,
}

impl Drop for AssetLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        held.remove(&self.asset_id);
        self.locks.freed.notify_all();
    }
}
