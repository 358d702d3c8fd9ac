//! Reconciler: diff the desired node set against the persisted one and
//! produce a minimal edit plan.
//!
//! The diff is joined purely on synthesis keys:
//! - desired key absent from existing          => Create
//! - key present, content differs              => Update
//! - key present, content identical            => Preserve (traceability)
//! - existing generated key absent from desired => Delete
//! - existing node without a key (authored)    => always Preserve
//!
//! The last rule is the safety invariant of the whole engine: a node
//! without a synthesis key is permanently untouchable by generation. A
//! keyed node whose `authored` flag is set (generated once, hand-edited
//! since) gets the same protection; drift is logged, never overwritten.

use crate::graph::key::SynthesisKey;
use crate::graph::node::{DesiredGraphNode, ExistingGraphNode};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Two desired nodes collided on one key. Deterministic role
    /// enumeration should make this impossible; failing hard beats a
    /// silent overwrite.
    #[error("synthesis key collision in desired set: {key}")]
    SynthesisKeyCollision { key: SynthesisKey },
}

/// One step of an edit plan. Produced by `reconcile`, consumed exactly
/// once by the asset mutator, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op")]
pub enum EditOperation {
    Create {
        key: SynthesisKey,
        role: String,
        content: Value,
    },
    Update {
        node_id: String,
        key: SynthesisKey,
        content: Value,
    },
    Delete {
        node_id: String,
        key: SynthesisKey,
    },
    Preserve {
        node_id: String,
    },
}

/// Plan-size counts, used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub preserved: usize,
}

impl PlanCounts {
    pub fn of(ops: &[EditOperation]) -> Self {
        let mut counts = Self::default();
        for op in ops {
            match op {
                EditOperation::Create { .. } => counts.created += 1,
                EditOperation::Update { .. } => counts.updated += 1,
                EditOperation::Delete { .. } => counts.deleted += 1,
                EditOperation::Preserve { .. } => counts.preserved += 1,
            }
        }
        counts
    }

    pub fn changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Compute the edit plan moving `existing` to match `desired`.
///
/// Output order is deterministic: desired nodes in synthesis order,
/// then deletes, then preserves for untouchable nodes, each sorted by
/// node id.
pub fn reconcile(
    desired: &[DesiredGraphNode],
    existing: &[ExistingGraphNode],
) -> Result<Vec<EditOperation>, ReconcileError> {
    // 1) Index the desired side, re-checking key uniqueness.
    let mut desired_by_key: BTreeMap<&SynthesisKey, &DesiredGraphNode> = BTreeMap::new();
    for node in desired {
        if desired_by_key.insert(&node.key, node).is_some() {
            return Err(ReconcileError::SynthesisKeyCollision {
                key: node.key.clone(),
            });
        }
    }

    // 2) Index the existing side. Keyless or authored nodes go straight
    // to the untouchable list.
    let mut existing_by_key: BTreeMap<&SynthesisKey, &ExistingGraphNode> = BTreeMap::new();
    let mut untouchable: Vec<&ExistingGraphNode> = Vec::new();
    for node in existing {
        match &node.key {
            Some(key) if !node.authored => {
                existing_by_key.insert(key, node);
            }
            Some(key) => {
                if let Some(want) = desired_by_key.get(key) {
                    if want.content != node.content {
                        tracing::warn!(
                            node_id = %node.node_id,
                            key = %key,
                            "generated node was hand-edited; preserving manual content"
                        );
                    }
                }
                untouchable.push(node);
            }
            None => untouchable.push(node),
        }
    }

    let mut ops: Vec<EditOperation> = Vec::with_capacity(existing.len() + desired.len());

    // 3) Desired side: create, update, or preserve.
    for node in desired {
        match existing_by_key.remove(&node.key) {
            None => {
                // An untouchable node may still hold this key (authored
                // flag set); never shadow it with a second copy.
                if untouchable.iter().any(|u| u.key.as_ref() == Some(&node.key)) {
                    continue;
                }
                ops.push(EditOperation::Create {
                    key: node.key.clone(),
                    role: node.role.to_string(),
                    content: node.content.clone(),
                });
            }
            Some(found) if found.content != node.content => {
                ops.push(EditOperation::Update {
                    node_id: found.node_id.clone(),
                    key: node.key.clone(),
                    content: node.content.clone(),
                });
            }
            Some(found) => {
                ops.push(EditOperation::Preserve {
                    node_id: found.node_id.clone(),
                });
            }
        }
    }

    // 4) Leftover generated nodes: their spec element was removed.
    let mut deletes: Vec<(String, SynthesisKey)> = existing_by_key
        .into_iter()
        .map(|(key, node)| (node.node_id.clone(), key.clone()))
        .collect();
    deletes.sort();
    ops.extend(
        deletes
            .into_iter()
            .map(|(node_id, key)| EditOperation::Delete { node_id, key }),
    );

    // 5) Untouchable nodes are preserved, unconditionally.
    untouchable.sort_by(|a, b| a.node_id.cmp(&b.node_id));
    for node in untouchable {
        ops.push(EditOperation::Preserve {
            node_id: node.node_id.clone(),
        });
    }

    Ok(ops)
}
