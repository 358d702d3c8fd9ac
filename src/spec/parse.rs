//! Ability document parser (abilities.json).
//!
//! JSON shape:
//! {
//!   "abilities": [
//!     {
//!       "id": "Fireball",
//!       "displayName": "Fireball",       // optional
//!       "description": "...",            // optional
//!       "tags": {
//!         "required": ["State.CanCast"],
//!         "grants": [],
//!         "blocks": []
//!       },
//!       "cost": 10,                       // number or attribute name
//!       "cooldown": 5,
//!       "parent": "BaseSpell",           // optional
//!       "effects": [
//!         {
//!           "name": "Damage",            // optional, override target
//!           "kind": "instant",           // instant | duration | periodic
//!           "attribute": "Health",
//!           "magnitude": -20,             // number or formula string
//!           "duration": 3.0,              // kind-dependent
//!           "period": 1.0,
//!           "overrides": "Damage"        // optional
//!         }
//!       ]
//!     }
//!   ]
//! }
//!
//! Parsing is all-or-nothing: any defect fails the whole document. Under
//! strict mode unknown fields at any level are rejected as well.

use crate::spec::model::{AbilitySpec, EffectKind, EffectSpec, Magnitude, Scalar, TagSets};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed ability document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("duplicate ability id in document: {0}")]
    DuplicateIdentifier(String),

    #[error("unknown field `{field}` at {path}")]
    UnknownField { path: String, field: String },

    #[error("ability `{id}` has an empty id after trimming")]
    EmptyIdentifier { id: String },

    #[error("ability `{id}`, effect {index}: unknown kind `{kind}`")]
    UnknownEffectKind {
        id: String,
        index: usize,
        kind: String,
    },
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    abilities: Vec<RawAbility>,
}

#[derive(Debug, Deserialize)]
struct RawAbility {
    id: String,

    #[serde(default, rename = "displayName")]
    display_name: Option<String>,

    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    tags: Option<RawTagSets>,

    #[serde(default)]
    cost: Option<RawScalar>,

    #[serde(default)]
    cooldown: Option<RawScalar>,

    #[serde(default)]
    parent: Option<String>,

    #[serde(default)]
    effects: Vec<RawEffect>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTagSets {
    #[serde(default)]
    required: Vec<String>,

    #[serde(default)]
    grants: Vec<String>,

    #[serde(default)]
    blocks: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Number(f64),
    Attribute(String),
}

#[derive(Debug, Deserialize)]
struct RawEffect {
    #[serde(default)]
    name: Option<String>,

    kind: String,

    attribute: String,

    magnitude: RawMagnitude,

    #[serde(default)]
    duration: Option<f64>,

    #[serde(default)]
    period: Option<f64>,

    #[serde(default)]
    overrides: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMagnitude {
    Number(f64),
    Formula(String),
}

/// Parse a raw JSON document into ability specs.
///
/// Phases:
/// 1) Structural JSON parse (strict mode also rejects unknown fields).
/// 2) Normalize fields (trim ids, sort+dedup tag lists, map effect kinds).
/// 3) Reject duplicate ids within the document.
pub fn parse(text: &str, strict: bool) -> Result<Vec<AbilitySpec>, ParseError> {
    let value: Value = serde_json::from_str(text)?;
    if strict {
        check_unknown_fields(&value)?;
    }
    let raw: RawDocument = serde_json::from_value(value)?;

    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(raw.abilities.len());

    for ability in raw.abilities {
        let id = ability.id.trim().to_string();
        if id.is_empty() {
            return Err(ParseError::EmptyIdentifier { id: ability.id });
        }
        if !seen.insert(id.clone()) {
            return Err(ParseError::DuplicateIdentifier(id));
        }

        let tags = ability.tags.map(|t| TagSets {
            required: normalize_tags(t.required),
            grants: normalize_tags(t.grants),
            blocks: normalize_tags(t.blocks),
        });

        let mut effects = Vec::with_capacity(ability.effects.len());
        for (index, raw_effect) in ability.effects.into_iter().enumerate() {
            effects.push(build_effect(&id, index, raw_effect)?);
        }

        out.push(AbilitySpec {
            id,
            display_name: ability.display_name,
            description: ability.description,
            tags,
            cost: ability.cost.map(Scalar::from),
            cooldown: ability.cooldown.map(Scalar::from),
            parent: ability.parent.map(|p| p.trim().to_string()),
            effects,
        });
    }

    Ok(out)
}

impl From<RawScalar> for Scalar {
    fn from(raw: RawScalar) -> Self {
        match raw {
            RawScalar::Number(n) => Scalar::Literal(n),
            RawScalar::Attribute(a) => Scalar::Attribute(a),
        }
    }
}

fn build_effect(id: &str, index: usize, raw: RawEffect) -> Result<EffectSpec, ParseError> {
    let kind = match raw.kind.as_str() {
        "instant" => EffectKind::Instant,
        "duration" => EffectKind::Duration,
        "periodic" => EffectKind::Periodic,
        other => {
            return Err(ParseError::UnknownEffectKind {
                id: id.to_string(),
                index,
                kind: other.to_string(),
            });
        }
    };

    Ok(EffectSpec {
        name: raw.name,
        kind,
        attribute: raw.attribute,
        magnitude: match raw.magnitude {
            RawMagnitude::Number(n) => Magnitude::Literal(n),
            RawMagnitude::Formula(f) => Magnitude::Formula(f),
        },
        duration: raw.duration,
        period: raw.period,
        overrides: raw.overrides,
    })
}

fn normalize_tags(mut tags: Vec<String>) -> Vec<String> {
    // Sort + deduplicate so structural equality ignores input ordering.
    for t in &mut tags {
        *t = t.trim().to_string();
    }
    tags.retain(|t| !t.is_empty());
    tags.sort();
    tags.dedup();
    tags
}

const DOCUMENT_KEYS: &[&str] = &["abilities"];
const ABILITY_KEYS: &[&str] = &[
    "id",
    "displayName",
    "description",
    "tags",
    "cost",
    "cooldown",
    "parent",
    "effects",
];
const TAGS_KEYS: &[&str] = &["required", "grants", "blocks"];
const EFFECT_KEYS: &[&str] = &[
    "name",
    "kind",
    "attribute",
    "magnitude",
    "duration",
    "period",
    "overrides",
];

/// Strict-mode pass: walk the raw JSON and reject any key that is not
/// part of the document schema.
fn check_unknown_fields(value: &Value) -> Result<(), ParseError> {
    check_keys(value, DOCUMENT_KEYS, "document")?;

    let Some(abilities) = value.get("abilities").and_then(Value::as_array) else {
        return Ok(());
    };

    for (i, ability) in abilities.iter().enumerate() {
        let at = format!("abilities[{i}]");
        check_keys(ability, ABILITY_KEYS, &at)?;

        if let Some(tags) = ability.get("tags") {
            check_keys(tags, TAGS_KEYS, &format!("{at}.tags"))?;
        }
        if let Some(effects) = ability.get("effects").and_then(Value::as_array) {
            for (j, effect) in effects.iter().enumerate() {
                check_keys(effect, EFFECT_KEYS, &format!("{at}.effects[{j}]"))?;
            }
        }
    }

    Ok(())
}

fn check_keys(value: &Value, allowed: &[&str], path: &str) -> Result<(), ParseError> {
    if let Some(map) = value.as_object() {
        for key in map.keys() {
            if !allowed.contains(&key.as_str()) {
                return Err(ParseError::UnknownField {
                    path: path.to_string(),
                    field: key.clone(),
                });
            }
        }
    }
    Ok(())
}
