//! Tag registry adapter: a read-only view over the host gameplay-tag
//! catalog, plus the attribute catalog used to resolve attribute refs.
//!
//! The core never holds a mutable global reference to the host catalog;
//! it is handed a `&dyn TagRegistry` / `&dyn AttributeCatalog` explicitly
//! at validation time and queries it only there.
//!
//! Catalog file shape (catalog.json):
//! {
//!   "tags": ["State.CanCast", "Status.Burning"],
//!   "attributes": ["Health", "Mana", "Strength"]
//! }
//!
//! Tags are hierarchical: registering "A.B.C" implies "A" and "A.B".

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Opaque handle into the tag catalog. Only obtainable through a
/// successful `TagRegistry::resolve`, never from a raw string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TagHandle(String);

impl TagHandle {
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// A tag reference that has been checked against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagReference {
    handle: TagHandle,
}

impl TagReference {
    /// Resolve `name` against the registry. Returns `None` for unknown
    /// tags; this is the only way to construct a `TagReference`.
    pub fn resolve(registry: &dyn TagRegistry, name: &str) -> Option<Self> {
        registry.resolve(name).map(|handle| Self { handle })
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }
}

/// Read-only view over the host tag catalog. Queried during validation
/// only.
pub trait TagRegistry {
    fn resolve(&self, name: &str) -> Option<TagHandle>;

    fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}

/// Read-only view over the known attribute set (e.g. Health, Mana).
pub trait AttributeCatalog {
    fn has_attribute(&self, name: &str) -> bool;
}

/// File-backed catalog implementing both registry traits. Stands in for
/// the host engine's tag/attribute reflection data.
#[derive(Debug, Clone, Default)]
pub struct FileCatalog {
    tags: BTreeSet<String>,
    attributes: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    tags: Vec<String>,

    #[serde(default)]
    attributes: Vec<String>,
}

impl FileCatalog {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let text = fs::read_to_string(path)
            .with_context(|| format!("read catalog file {}", path.display()))?;
        let raw: RawCatalog = serde_json::from_str(&text)
            .with_context(|| format!("parse catalog file {}", path.display()))?;

        Ok(Self::from_parts(raw.tags, raw.attributes))
    }

    pub fn from_parts<T, A>(tags: T, attributes: A) -> Self
    where
        T: IntoIterator<Item = String>,
        A: IntoIterator<Item = String>,
    {
        let mut expanded = BTreeSet::new();
        for tag in tags {
            let tag = tag.trim();
            if tag.is_empty() {
                continue;
            }
            // "A.B.C" implies its ancestors "A" and "A.B".
            let mut prefix = String::new();
            for segment in tag.split('.') {
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(segment);
                expanded.insert(prefix.clone());
            }
        }

        let attributes = attributes
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        Self {
            tags: expanded,
            attributes,
        }
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }
}

impl TagRegistry for FileCatalog {
    fn resolve(&self, name: &str) -> Option<TagHandle> {
        self.tags.get(name).map(|t| TagHandle(t.clone()))
    }
}

impl AttributeCatalog for FileCatalog {
    fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn catalog() -> FileCatalog {
        FileCatalog::from_parts(
            vec!["State.CanCast.Fire".to_string()],
            vec!["Health".to_string()],
        )
    }

    #[test]
    fn resolves_registered_tags_and_ancestors() {
        let c = catalog();
        assert!(c.exists("State.CanCast.Fire"));
        assert!(c.exists("State.CanCast"));
        assert!(c.exists("State"));
        assert!(!c.exists("State.CanCast.Ice"));
        assert_eq!(c.tag_count(), 3);
    }

    #[test]
    fn tag_reference_only_from_successful_lookup() {
        let c = catalog();
        let r = TagReference::resolve(&c, "State.CanCast").unwrap();
        assert_eq!(r.name(), "State.CanCast");
        assert!(TagReference::resolve(&c, "Nope").is_none());
    }

    #[test]
    fn attribute_lookup() {
        let c = catalog();
        assert!(c.has_attribute("Health"));
        assert!(!c.has_attribute("Mana"));
    }
}
