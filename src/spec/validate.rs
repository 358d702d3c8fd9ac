//! Semantic validation of parsed ability specs.
//!
//! Validation is exhaustive: one pass collects *every* defect and returns
//! the whole list, so a single run reports the complete picture instead
//! of stopping at the first error.
//!
//! Checks performed:
//! - duplicate ids (re-checked here: validate accepts merged spec sets
//!   from several documents, where cross-document collisions can appear)
//! - every tag reference resolves in the tag registry
//! - every attribute reference (cost/cooldown/effect/formula) resolves
//! - parent references resolve, and the parent chain is acyclic
//! - effect duration/period shape matches the effect kind
//! - effect `overrides` names an effect some ancestor actually has

use crate::registry::{AttributeCatalog, TagReference, TagRegistry};
use crate::spec::model::{AbilitySpec, EffectKind, Magnitude, Scalar};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("duplicate ability id: {id}")]
    DuplicateIdentifier { id: String },

    #[error("ability `{id}`: unresolved tag `{tag}` in tags.{set}")]
    UnresolvedTag { id: String, set: String, tag: String },

    #[error("ability `{id}`: unresolved attribute `{attribute}` in {site}")]
    UnresolvedAttribute {
        id: String,
        site: String,
        attribute: String,
    },

    #[error("ability `{id}`: unresolved parent reference `{parent}`")]
    UnresolvedReference { id: String, parent: String },

    #[error("cyclic inheritance: {chain}")]
    CyclicInheritance { chain: String },

    #[error("ability `{id}`, effect {index}: {reason}")]
    InvalidEffectShape {
        id: String,
        index: usize,
        reason: String,
    },

    #[error("ability `{id}`, effect {index}: invalid magnitude formula: {detail}")]
    InvalidFormula {
        id: String,
        index: usize,
        detail: String,
    },

    #[error("ability `{id}`, effect {index}: overrides unknown parent effect `{name}`")]
    UnknownOverride {
        id: String,
        index: usize,
        name: String,
    },
}

/// Validate a merged set of ability specs against the tag registry and
/// attribute catalog. Returns `Ok(())` or the complete defect list.
pub fn validate(
    specs: &[AbilitySpec],
    tags: &dyn TagRegistry,
    attributes: &dyn AttributeCatalog,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let formula = FormulaChecker::new();

    // 1) Duplicate ids across the merged set.
    let mut seen = BTreeSet::new();
    for spec in specs {
        if !seen.insert(spec.id.as_str()) {
            errors.push(ValidationError::DuplicateIdentifier {
                id: spec.id.clone(),
            });
        }
    }
    let ids: BTreeSet<&str> = seen;

    // 2) Per-ability reference and shape checks.
    for spec in specs {
        check_tags(spec, tags, &mut errors);
        check_scalar(&spec.id, "cost", spec.cost.as_ref(), attributes, &mut errors);
        check_scalar(
            &spec.id,
            "cooldown",
            spec.cooldown.as_ref(),
            attributes,
            &mut errors,
        );

        for (index, effect) in spec.effects.iter().enumerate() {
            check_effect_shape(&spec.id, index, effect.kind, effect, &mut errors);

            if !attributes.has_attribute(&effect.attribute) {
                errors.push(ValidationError::UnresolvedAttribute {
                    id: spec.id.clone(),
                    site: format!("effect {index}"),
                    attribute: effect.attribute.clone(),
                });
            }

            if let Magnitude::Formula(text) = &effect.magnitude {
                formula.check(&spec.id, index, text, attributes, &mut errors);
            }
        }

        if let Some(parent) = &spec.parent {
            if !ids.contains(parent.as_str()) {
                errors.push(ValidationError::UnresolvedReference {
                    id: spec.id.clone(),
                    parent: parent.clone(),
                });
            }
        }
    }

    // 3) Cycle detection over the parent chain (DFS coloring).
    let by_id: BTreeMap<&str, &AbilitySpec> = specs.iter().map(|s| (s.id.as_str(), s)).collect();
    check_cycles(&by_id, &mut errors);

    // 4) Override targets: only checked for abilities with clean ancestry
    // so a broken parent chain does not cascade into noise.
    let prior = errors.clone();
    check_overrides(&by_id, &prior, &mut errors);

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check_tags(spec: &AbilitySpec, tags: &dyn TagRegistry, errors: &mut Vec<ValidationError>) {
    let Some(sets) = &spec.tags else {
        return;
    };
    for (set, list) in [
        ("required", &sets.required),
        ("grants", &sets.grants),
        ("blocks", &sets.blocks),
    ] {
        for tag in list {
            if TagReference::resolve(tags, tag).is_none() {
                errors.push(ValidationError::UnresolvedTag {
                    id: spec.id.clone(),
                    set: set.to_string(),
                    tag: tag.clone(),
                });
            }
        }
    }
}

fn check_scalar(
    id: &str,
    site: &str,
    scalar: Option<&Scalar>,
    attributes: &dyn AttributeCatalog,
    errors: &mut Vec<ValidationError>,
) {
    if let Some(Scalar::Attribute(name)) = scalar {
        if !attributes.has_attribute(name) {
            errors.push(ValidationError::UnresolvedAttribute {
                id: id.to_string(),
                site: site.to_string(),
                attribute: name.clone(),
            });
        }
    }
}

fn check_effect_shape(
    id: &str,
    index: usize,
    kind: EffectKind,
    effect: &crate::spec::model::EffectSpec,
    errors: &mut Vec<ValidationError>,
) {
    let mut fail = |reason: &str| {
        errors.push(ValidationError::InvalidEffectShape {
            id: id.to_string(),
            index,
            reason: reason.to_string(),
        });
    };

    match kind {
        EffectKind::Instant => {
            if effect.duration.is_some() {
                fail("instant effect must not set duration");
            }
            if effect.period.is_some() {
                fail("instant effect must not set period");
            }
        }
        EffectKind::Duration => {
            if effect.duration.is_none() {
                fail("duration effect requires duration");
            }
            if effect.period.is_some() {
                fail("duration effect must not set period");
            }
        }
        EffectKind::Periodic => {
            if effect.duration.is_none() {
                fail("periodic effect requires duration");
            }
            if effect.period.is_none() {
                fail("periodic effect requires period");
            }
        }
    }

    if let Some(period) = effect.period {
        if period <= 0.0 {
            fail("period must be positive");
        }
    }
    if let Some(duration) = effect.duration {
        if duration <= 0.0 {
            fail("duration must be positive");
        }
    }
}

fn check_cycles(by_id: &BTreeMap<&str, &AbilitySpec>, errors: &mut Vec<ValidationError>) {
    #[derive(Copy, Clone, PartialEq, Eq)]
    enum Mark {
        Temp,
        Perm,
    }

    let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();

    for &start in by_id.keys() {
        if marks.contains_key(start) {
            continue;
        }

        // Each node has at most one parent, so the "DFS" is a chain walk.
        let mut chain: Vec<&str> = Vec::new();
        let mut cur = start;
        loop {
            match marks.get(cur) {
                Some(Mark::Perm) => break,
                Some(Mark::Temp) => {
                    // cur is in the current chain => cycle.
                    let from = chain.iter().position(|c| *c == cur).unwrap_or(0);
                    let mut cycle: Vec<&str> = chain[from..].to_vec();
                    cycle.push(cur);
                    errors.push(ValidationError::CyclicInheritance {
                        chain: cycle.join(" -> "),
                    });
                    break;
                }
                None => {
                    marks.insert(cur, Mark::Temp);
                    chain.push(cur);
                    match by_id.get(cur).and_then(|s| s.parent.as_deref()) {
                        Some(parent) if by_id.contains_key(parent) => cur = parent,
                        // Unresolved parent is reported elsewhere.
                        _ => break,
                    }
                }
            }
        }
        for visited in chain {
            marks.insert(visited, Mark::Perm);
        }
    }
}

fn check_overrides(
    by_id: &BTreeMap<&str, &AbilitySpec>,
    prior: &[ValidationError],
    errors: &mut Vec<ValidationError>,
) {
    let broken: BTreeSet<&str> = prior
        .iter()
        .filter_map(|e| match e {
            ValidationError::UnresolvedReference { id, .. } => Some(id.as_str()),
            ValidationError::CyclicInheritance { chain } => chain.split(" -> ").next(),
            _ => None,
        })
        .collect();

    for (&id, spec) in by_id {
        // Skip abilities whose ancestry cannot be walked safely.
        if ancestry_is_broken(by_id, &broken, id) {
            continue;
        }

        let mut ancestor_names: BTreeSet<&str> = BTreeSet::new();
        let mut cur = spec.parent.as_deref();
        while let Some(pid) = cur {
            let Some(parent) = by_id.get(pid) else { break };
            ancestor_names.extend(parent.effects.iter().filter_map(|e| e.name.as_deref()));
            cur = parent.parent.as_deref();
        }

        for (index, effect) in spec.effects.iter().enumerate() {
            if let Some(name) = &effect.overrides {
                if !ancestor_names.contains(name.as_str()) {
                    errors.push(ValidationError::UnknownOverride {
                        id: id.to_string(),
                        index,
                        name: name.clone(),
                    });
                }
            }
        }
    }
}

fn ancestry_is_broken(
    by_id: &BTreeMap<&str, &AbilitySpec>,
    broken: &BTreeSet<&str>,
    id: &str,
) -> bool {
    let mut cur = Some(id);
    let mut hops = 0usize;
    while let Some(c) = cur {
        if broken.contains(c) || hops > by_id.len() {
            return true;
        }
        hops += 1;
        cur = by_id.get(c).and_then(|s| s.parent.as_deref());
        if let Some(next) = cur {
            if !by_id.contains_key(next) {
                return true;
            }
        }
    }
    false
}

/// Magnitude formula checker: the formula must consist of numbers,
/// attribute identifiers, `+ - * /` and balanced parentheses; every
/// identifier must resolve in the attribute catalog.
struct FormulaChecker {
    token: Regex,
    ident: Regex,
}

impl FormulaChecker {
    fn new() -> Self {
        // Both patterns are fixed literals; compilation cannot fail.
        Self {
            token: Regex::new(
                r"^(?:\s+|[0-9]+(?:\.[0-9]+)?|[A-Za-z_][A-Za-z0-9_.]*|[-+*/()])+$",
            )
            .unwrap(),
            ident: Regex::new(r"[A-Za-z_][A-Za-z0-9_.]*").unwrap(),
        }
    }

    fn check(
        &self,
        id: &str,
        index: usize,
        text: &str,
        attributes: &dyn AttributeCatalog,
        errors: &mut Vec<ValidationError>,
    ) {
        if text.trim().is_empty() || !self.token.is_match(text) {
            errors.push(ValidationError::InvalidFormula {
                id: id.to_string(),
                index,
                detail: format!("unparsable expression: {text:?}"),
            });
            return;
        }

        let mut depth: i32 = 0;
        for c in text.chars() {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                break;
            }
        }
        if depth != 0 {
            errors.push(ValidationError::InvalidFormula {
                id: id.to_string(),
                index,
                detail: format!("unbalanced parentheses: {text:?}"),
            });
            return;
        }

        for m in self.ident.find_iter(text) {
            if !attributes.has_attribute(m.as_str()) {
                errors.push(ValidationError::UnresolvedAttribute {
                    id: id.to_string(),
                    site: format!("effect {index} magnitude formula"),
                    attribute: m.as_str().to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FileCatalog;
    use crate::spec::model::{EffectSpec, TagSets};
    use pretty_assertions::assert_eq;

    fn catalog() -> FileCatalog {
        FileCatalog::from_parts(
            vec!["State.CanCast".to_string()],
            vec!["Health".to_string(), "Strength".to_string()],
        )
    }

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

    fn instant(attribute: &str, magnitude: Magnitude) -> EffectSpec {
        EffectSpec {
            name: None,
            kind: EffectKind::Instant,
            attribute: attribute.to_string(),
            magnitude,
            duration: None,
            period: None,
            overrides: None,
        }
    }

    #[test]
    fn clean_document_validates() {
        let mut spec = ability("Fireball");
        spec.tags = Some(TagSets {
            required: vec!["State.CanCast".to_string()],
            ..TagSets::default()
        });
        spec.cooldown = Some(Scalar::Literal(5.0));
        spec.effects = vec![instant("Health", Magnitude::Literal(-20.0))];

        assert_eq!(validate(&[spec], &catalog(), &catalog()), Ok(()));
    }

    #[test]
    fn unresolved_tag_is_a_single_error() {
        let mut spec = ability("Fireball");
        spec.tags = Some(TagSets {
            required: vec!["State.CanCast".to_string()],
            ..TagSets::default()
        });
        spec.effects = vec![instant("Health", Magnitude::Literal(-20.0))];

        // Registry without the tag.
        let empty = FileCatalog::from_parts(vec![], vec!["Health".to_string()]);
        let errors = validate(&[spec], &empty, &empty).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnresolvedTag {
                id: "Fireball".to_string(),
                set: "required".to_string(),
                tag: "State.CanCast".to_string(),
            }]
        );
    }

    #[test]
    fn collects_all_independent_defects_in_one_pass() {
        // One duplicate id, one unresolved tag, one inheritance cycle.
        let mut dup_a = ability("Dup");
        let dup_b = ability("Dup");
        dup_a.tags = Some(TagSets {
            required: vec!["No.Such.Tag".to_string()],
            ..TagSets::default()
        });

        let mut cyc_a = ability("CycA");
        cyc_a.parent = Some("CycB".to_string());
        let mut cyc_b = ability("CycB");
        cyc_b.parent = Some("CycA".to_string());

        let errors = validate(
            &[dup_a, dup_b, cyc_a, cyc_b],
            &catalog(),
            &catalog(),
        )
        .unwrap_err();

        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateIdentifier { id } if id == "Dup")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnresolvedTag { tag, .. } if tag == "No.Such.Tag")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::CyclicInheritance { .. })));
    }

    #[test]
    fn effect_shape_rules() {
        let mut spec = ability("A");
        spec.effects = vec![
            // instant with a duration: invalid
            EffectSpec {
                duration: Some(3.0),
                ..instant("Health", Magnitude::Literal(1.0))
            },
            // periodic missing period: invalid
            EffectSpec {
                kind: EffectKind::Periodic,
                duration: Some(3.0),
                ..instant("Health", Magnitude::Literal(1.0))
            },
        ];
        let errors = validate(&[spec], &catalog(), &catalog()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ValidationError::InvalidEffectShape { .. })));
    }

    #[test]
    fn formula_identifiers_must_resolve() {
        let mut spec = ability("A");
        spec.effects = vec![instant(
            "Health",
            Magnitude::Formula("-0.5 * Strength + Luck".to_string()),
        )];
        let errors = validate(&[spec], &catalog(), &catalog()).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnresolvedAttribute {
                id: "A".to_string(),
                site: "effect 0 magnitude formula".to_string(),
                attribute: "Luck".to_string(),
            }]
        );
    }

    #[test]
    fn malformed_formula_is_rejected() {
        let mut spec = ability("A");
        spec.effects = vec![instant(
            "Health",
            Magnitude::Formula("(Strength".to_string()),
        )];
        let errors = validate(&[spec], &catalog(), &catalog()).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidFormula { .. }));
    }

    #[test]
    fn unresolved_parent_reference() {
        let mut spec = ability("Child");
        spec.parent = Some("Ghost".to_string());
        let errors = validate(&[spec], &catalog(), &catalog()).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnresolvedReference {
                id: "Child".to_string(),
                parent: "Ghost".to_string(),
            }]
        );
    }

    #[test]
    fn override_must_name_an_ancestor_effect() {
        let mut parent = ability("Base");
        parent.effects = vec![EffectSpec {
            name: Some("Damage".to_string()),
            ..instant("Health", Magnitude::Literal(-5.0))
        }];

        let mut child = ability("Child");
        child.parent = Some("Base".to_string());
        child.effects = vec![EffectSpec {
            overrides: Some("Heal".to_string()),
            ..instant("Health", Magnitude::Literal(-10.0))
        }];

        let errors = validate(&[parent, child], &catalog(), &catalog()).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnknownOverride {
                id: "Child".to_string(),
                index: 0,
                name: "Heal".to_string(),
            }]
        );
    }
}
