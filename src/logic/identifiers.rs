//! Identifier remapping collected while importing a project.

use std::collections::HashMap;

use log::warn;

/// Old identifier (as found in an imported document) to the identifier
/// assigned at import time.
///
/// One map is owned by each import operation; it is never shared between
/// imports and never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierMap {
    identifiers: HashMap<String, String>,
}

impl IdentifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `old_id -> new_id`. The first registration of an old id wins;
    /// later ones are ignored. Returns whether the mapping was inserted.
    pub fn register(&mut self, old_id: &str, new_id: &str) -> bool {
        if old_id.is_empty() {
            return false;
        }
        match self.identifiers.get(old_id) {
            Some(existing) => {
                if existing != new_id {
                    warn!(
                        "Identifier '{}' is already mapped to '{}', ignoring '{}'",
                        old_id, existing, new_id
                    );
                }
                false
            }
            None => {
                self.identifiers.insert(old_id.to_string(), new_id.to_string());
                true
            }
        }
    }

    pub fn get(&self, old_id: &str) -> Option<&str> {
        self.identifiers.get(old_id).map(String::as_str)
    }

    pub fn contains(&self, old_id: &str) -> bool {
        self.identifiers.contains_key(old_id)
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.identifiers
            .iter()
            .map(|(old, new)| (old.as_str(), new.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for IdentifierMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = IdentifierMap::new();
        for (old, new) in iter {
            let (old, new) = (old.into(), new.into());
            map.register(&old, &new);
        }
        map
    }
}
