//! Schema model: the in-memory representation of an ability
//! specification document.
//!
//! Pure data, no engine dependency. Instances are built fresh per parse,
//! immutable afterwards, and discarded once synthesis has run.
//!
//! Inheritable fields are `Option` so the synthesizer can tell "child
//! specified this field" (last-writer-wins) apart from "child inherits".

use serde::Serialize;

/// One ability definition. `id` is unique within a loaded document.
#[derive(Debug, Clone, PartialEq)]
pub struct AbilitySpec {
    pub id: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<TagSets>,
    pub cost: Option<Scalar>,
    pub cooldown: Option<Scalar>,
    pub parent: Option<String>,
    pub effects: Vec<EffectSpec>,
}

/// Tag gating sets. Lists are sorted and deduplicated at parse so that
/// structurally equal specs compare equal regardless of input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagSets {
    pub required: Vec<String>,
    pub grants: Vec<String>,
    pub blocks: Vec<String>,
}

impl TagSets {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.grants.is_empty() && self.blocks.is_empty()
    }
}

/// Cost/cooldown value: a literal number or an attribute-driven value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Literal(f64),
    Attribute(String),
}

/// Effect magnitude: a literal or a formula over attributes
/// (e.g. "-0.5 * Strength + 10").
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Magnitude {
    Literal(f64),
    Formula(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Instant,
    Duration,
    Periodic,
}

impl EffectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Instant => "instant",
            EffectKind::Duration => "duration",
            EffectKind::Periodic => "periodic",
        }
    }
}

/// One attribute modification carried by an ability.
///
/// Shape invariant (enforced by the validator):
/// - instant: no duration, no period
/// - duration: duration required, no period
/// - periodic: duration and period required
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectSpec {
    /// Optional stable name; the target for child `overrides`.
    pub name: Option<String>,
    pub kind: EffectKind,
    pub attribute: String,
    pub magnitude: Magnitude,
    pub duration: Option<f64>,
    pub period: Option<f64>,
    /// Suppresses the parent effect of this name during inheritance.
    pub overrides: Option<String>,
}
