//! Graph synthesizer: maps a validated ability spec onto the desired
//! node set.
//!
//! Synthesis is a pure function of its input: structurally equal
//! abilities always synthesize identical node sets with identical
//! synthesis keys. That determinism is what lets the reconciler
//! recognize "this existing node came from this spec element" across
//! repeated runs.
//!
//! Inheritance is resolved first: the parent chain is flattened
//! root-first, child-specified fields win per field, and effect
//! sequences concatenate parent-first. A child effect carrying
//! `overrides: "Name"` suppresses the ancestor effect of that name.

use crate::graph::key::{NodeRole, SynthesisKey};
use crate::graph::node::DesiredGraphNode;
use crate::spec::model::{AbilitySpec, EffectSpec, Magnitude, Scalar, TagSets};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthError {
    /// Internal invariant violation; signals a synthesizer bug, never a
    /// bad document.
    #[error("synthesis key collision: {key} produced by both {first} and {second}")]
    SynthesisKeyCollision {
        key: SynthesisKey,
        first: String,
        second: String,
    },

    #[error("ability `{id}` references parent `{parent}` not in the loaded set")]
    UnresolvedParent { id: String, parent: String },

    #[error("inheritance cycle reached from ability `{id}`")]
    CycleDetected { id: String },

    #[error("payload serialization: {0}")]
    Payload(#[from] serde_json::Error),
}

/// An ability with its parent chain flattened: no `parent` left, all
/// inherited fields materialized.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveAbility {
    pub id: String,
    pub display_name: String,
    pub tags: TagSets,
    pub cost: Option<Scalar>,
    pub cooldown: Option<Scalar>,
    pub effects: Vec<EffectSpec>,
}

/// Flatten the parent chain of `id`. Expects a validated spec set;
/// unresolved parents and cycles are still reported rather than looping.
pub fn resolve_effective(
    specs: &BTreeMap<String, AbilitySpec>,
    id: &str,
) -> Result<EffectiveAbility, SynthError> {
    // Collect the chain child-first, then reverse to layer root-first.
    let mut chain: Vec<&AbilitySpec> = Vec::new();
    let mut on_chain: BTreeSet<&str> = BTreeSet::new();
    let mut cur = id;
    loop {
        let Some(spec) = specs.get(cur) else {
            return Err(SynthError::UnresolvedParent {
                id: chain.last().map(|s| s.id.clone()).unwrap_or_else(|| id.to_string()),
                parent: cur.to_string(),
            });
        };
        if !on_chain.insert(cur) {
            return Err(SynthError::CycleDetected { id: id.to_string() });
        }
        chain.push(spec);
        match spec.parent.as_deref() {
            Some(parent) => cur = parent,
            None => break,
        }
    }
    chain.reverse();

    let mut display_name: Option<String> = None;
    let mut tags: Option<TagSets> = None;
    let mut cost: Option<Scalar> = None;
    let mut cooldown: Option<Scalar> = None;
    let mut effects: Vec<EffectSpec> = Vec::new();

    for level in chain {
        // Last writer wins per field; unspecified fields inherit.
        if level.display_name.is_some() {
            display_name = level.display_name.clone();
        }
        if level.tags.is_some() {
            tags = level.tags.clone();
        }
        if level.cost.is_some() {
            cost = level.cost.clone();
        }
        if level.cooldown.is_some() {
            cooldown = level.cooldown.clone();
        }

        for effect in &level.effects {
            if let Some(target) = &effect.overrides {
                effects.retain(|e| e.name.as_deref() != Some(target.as_str()));
            }
            effects.push(effect.clone());
        }
    }

    Ok(EffectiveAbility {
        id: id.to_string(),
        display_name: display_name.unwrap_or_else(|| id.to_string()),
        tags: tags.unwrap_or_default(),
        cost,
        cooldown,
        effects,
    })
}

/// Gate-node payload: tag gating plus cost and cooldown.
#[derive(Debug, Serialize)]
struct TagCheckPayload<'a> {
    required: &'a [String],
    grants: &'a [String],
    blocks: &'a [String],
    cost: Option<&'a Scalar>,
    cooldown: Option<&'a Scalar>,
}

/// Effect-node payload. `overrides` is an inheritance directive and does
/// not survive flattening, so it never reaches a payload.
#[derive(Debug, Serialize)]
struct EffectPayload<'a> {
    name: Option<&'a str>,
    kind: &'static str,
    attribute: &'a str,
    magnitude: &'a Magnitude,
    duration: Option<f64>,
    period: Option<f64>,
}

/// Synthesize the desired node set for one effective ability.
///
/// Emits one tag-check node iff any gating content exists (tags, cost,
/// cooldown), plus one effect node per effective effect, in that order.
pub fn synthesize(ability: &EffectiveAbility) -> Result<Vec<DesiredGraphNode>, SynthError> {
    let mut nodes: Vec<DesiredGraphNode> = Vec::new();

    let has_gate =
        !ability.tags.is_empty() || ability.cost.is_some() || ability.cooldown.is_some();
    if has_gate {
        let payload = TagCheckPayload {
            required: &ability.tags.required,
            grants: &ability.tags.grants,
            blocks: &ability.tags.blocks,
            cost: ability.cost.as_ref(),
            cooldown: ability.cooldown.as_ref(),
        };
        nodes.push(DesiredGraphNode {
            key: SynthesisKey::derive(&ability.id, NodeRole::TagCheck),
            role: NodeRole::TagCheck,
            content: serde_json::to_value(&payload)?,
        });
    }

    for (index, effect) in ability.effects.iter().enumerate() {
        let role = NodeRole::Effect(index as u32);
        let payload = EffectPayload {
            name: effect.name.as_deref(),
            kind: effect.kind.as_str(),
            attribute: &effect.attribute,
            magnitude: &effect.magnitude,
            duration: effect.duration,
            period: effect.period,
        };
        nodes.push(DesiredGraphNode {
            key: SynthesisKey::derive(&ability.id, role),
            role,
            content: serde_json::to_value(&payload)?,
        });
    }

    // Collision check: deterministic role enumeration should make this
    // impossible, but silent overwrites are worse than a hard failure.
    let mut seen: BTreeMap<&SynthesisKey, NodeRole> = BTreeMap::new();
    for node in &nodes {
        if let Some(prev) = seen.insert(&node.key, node.role) {
            return Err(SynthError::SynthesisKeyCollision {
                key: node.key.clone(),
                first: prev.to_string(),
                second: node.role.to_string(),
            });
        }
    }

    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::model::EffectKind;
    use pretty_assertions::assert_eq;

    fn ability(id: &str) -> AbilitySpec {
        AbilitySpec {
            id: id.to_string(),
            display_name: None,
            description: None,
            tags: None,
            cost: None,
            cooldown: None,
            parent: None,
            effects: Vec::new(),
        }
    }

    fn named_effect(name: Option<&str>, magnitude: f64) -> EffectSpec {
        EffectSpec {
            name: name.map(str::to_string),
            kind: EffectKind::Instant,
            attribute: "Health".to_string(),
            magnitude: Magnitude::Literal(magnitude),
            duration: None,
            period: None,
            overrides: None,
        }
    }

    fn fireball() -> EffectiveAbility {
        EffectiveAbility {
            id: "Fireball".to_string(),
            display_name: "Fireball".to_string(),
            tags: TagSets {
                required: vec!["State.CanCast".to_string()],
                ..TagSets::default()
            },
            cost: None,
            cooldown: Some(Scalar::Literal(5.0)),
            effects: vec![named_effect(None, -20.0)],
        }
    }

    #[test]
    fn fireball_synthesizes_gate_plus_effect() {
        let nodes = synthesize(&fireball()).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].role, NodeRole::TagCheck);
        assert_eq!(nodes[0].key, SynthesisKey::derive("Fireball", NodeRole::TagCheck));
        assert_eq!(nodes[1].role, NodeRole::Effect(0));
        assert_eq!(nodes[1].key, SynthesisKey::derive("Fireball", NodeRole::Effect(0)));
    }

    #[test]
    fn synthesis_is_deterministic() {
        let a = synthesize(&fireball()).unwrap();
        let b = synthesize(&fireball()).unwrap();
        assert_eq!(a, b);
        // Byte-for-byte: serialized content is identical too.
        assert_eq!(
            serde_json::to_string(&a[0].content).unwrap(),
            serde_json::to_string(&b[0].content).unwrap()
        );
    }

    #[test]
    fn no_gate_node_without_gating_content() {
        let eff = EffectiveAbility {
            id: "Plain".to_string(),
            display_name: "Plain".to_string(),
            tags: TagSets::default(),
            cost: None,
            cooldown: None,
            effects: vec![named_effect(None, 1.0)],
        };
        let nodes = synthesize(&eff).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].role, NodeRole::Effect(0));
    }

    #[test]
    fn inheritance_concatenates_parent_effects_first() {
        let mut parent = ability("Base");
        parent.effects = vec![named_effect(Some("Damage"), -5.0)];
        parent.cooldown = Some(Scalar::Literal(2.0));

        let mut child = ability("Child");
        child.parent = Some("Base".to_string());
        child.effects = vec![named_effect(Some("Burn"), -1.0)];

        let specs: BTreeMap<String, AbilitySpec> = [parent, child]
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();

        let eff = resolve_effective(&specs, "Child").unwrap();
        assert_eq!(eff.cooldown, Some(Scalar::Literal(2.0)));
        assert_eq!(
            eff.effects.iter().map(|e| e.name.clone()).collect::<Vec<_>>(),
            vec![Some("Damage".to_string()), Some("Burn".to_string())]
        );
    }

    #[test]
    fn child_override_suppresses_named_parent_effect() {
        let mut parent = ability("Base");
        parent.effects = vec![
            named_effect(Some("Damage"), -5.0),
            named_effect(Some("Slow"), -1.0),
        ];

        let mut child = ability("Child");
        child.parent = Some("Base".to_string());
        child.effects = vec![EffectSpec {
            overrides: Some("Damage".to_string()),
            ..named_effect(Some("Damage"), -50.0)
        }];

        let specs: BTreeMap<String, AbilitySpec> = [parent, child]
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();

        let eff = resolve_effective(&specs, "Child").unwrap();
        assert_eq!(eff.effects.len(), 2);
        assert_eq!(eff.effects[0].name.as_deref(), Some("Slow"));
        assert_eq!(eff.effects[1].name.as_deref(), Some("Damage"));
        assert_eq!(eff.effects[1].magnitude, Magnitude::Literal(-50.0));
    }

    #[test]
    fn child_fields_win_over_parent_fields() {
        let mut parent = ability("Base");
        parent.display_name = Some("Base Spell".to_string());
        parent.cost = Some(Scalar::Literal(10.0));
        parent.tags = Some(TagSets {
            required: vec!["State.CanCast".to_string()],
            ..TagSets::default()
        });

        let mut child = ability("Child");
        child.parent = Some("Base".to_string());
        child.cost = Some(Scalar::Attribute("Mana".to_string()));

        let specs: BTreeMap<String, AbilitySpec> = [parent, child]
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();

        let eff = resolve_effective(&specs, "Child").unwrap();
        // Overridden by the child.
        assert_eq!(eff.cost, Some(Scalar::Attribute("Mana".to_string())));
        // Inherited from the parent.
        assert_eq!(eff.display_name, "Base Spell");
        assert_eq!(eff.tags.required, vec!["State.CanCast".to_string()]);
    }

    #[test]
    fn cycle_in_unvalidated_input_is_an_error_not_a_hang() {
        let mut a = ability("A");
        a.parent = Some("B".to_string());
        let mut b = ability("B");
        b.parent = Some("A".to_string());

        let specs: BTreeMap<String, AbilitySpec> = [a, b]
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();

        assert!(matches!(
            resolve_effective(&specs, "A"),
            Err(SynthError::CycleDetected { .. })
        ));
    }
}
