//! Node representations on both sides of reconciliation.
//!
//! DesiredGraphNode is what this generation run wants; ExistingGraphNode
//! mirrors what the asset store currently holds. Content is carried as
//! canonical JSON (serde_json maps are BTreeMaps here, so serialization
//! order is deterministic).

use crate::graph::key::{NodeRole, SynthesisKey};
use serde_json::Value;

/// An abstract synthesized unit, mapping 1:1 to a persisted graph node.
/// Rebuilt from scratch on every generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredGraphNode {
    pub key: SynthesisKey,
    pub role: NodeRole,
    pub content: Value,
}

/// A node already present in a persisted asset, read once per
/// reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingGraphNode {
    pub node_id: String,
    /// Present if the node was itself previously generated.
    pub key: Option<SynthesisKey>,
    /// True if a human created or edited this node outside generation.
    /// Such nodes are permanently untouchable by generation.
    pub authored: bool,
    pub content: Value,
}
