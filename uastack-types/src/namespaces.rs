// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the [`NamespaceMap`], used to translate between namespace URIs and the
//! indices a given server uses on the wire.

use hashbrown::HashMap;

use crate::constants;

/// Mapping from namespace URI to namespace index. Built once on session activation from the
/// server's `NamespaceArray` and treated as read-only afterwards.
#[derive(Debug, Clone)]
pub struct NamespaceMap {
    known_namespaces: HashMap<String, u16>,
}

impl Default for NamespaceMap {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceMap {
    /// Create a new namespace map containing only the core namespace.
    pub fn new() -> Self {
        let mut known_namespaces = HashMap::new();
        known_namespaces.insert(constants::CORE_NAMESPACE.to_owned(), 0u16);

        Self { known_namespaces }
    }

    /// Create a namespace map from a server's namespace array.
    pub fn new_from_namespace_array(namespaces: &[String]) -> Self {
        let mut known_namespaces = HashMap::new();
        for (idx, namespace) in namespaces.iter().enumerate() {
            known_namespaces.insert(namespace.clone(), idx as u16);
        }
        Self { known_namespaces }
    }

    /// Add a namespace, returning its index. Adding a known namespace returns the
    /// existing index.
    pub fn add_namespace(&mut self, namespace: &str) -> u16 {
        if let Some(idx) = self.known_namespaces.get(namespace) {
            return *idx;
        }
        let max = self
            .known_namespaces
            .values()
            .max()
            .copied()
            .unwrap_or_default();
        self.known_namespaces.insert(namespace.to_owned(), max + 1);
        max + 1
    }

    /// Get the inner map.
    pub fn known_namespaces(&self) -> &HashMap<String, u16> {
        &self.known_namespaces
    }

    /// Get the index of the given namespace URI, if known.
    pub fn get_index(&self, namespace: &str) -> Option<u16> {
        self.known_namespaces.get(namespace).copied()
    }

    /// Reverse lookup of the URI for a given index.
    pub fn get_namespace(&self, index: u16) -> Option<&str> {
        self.known_namespaces
            .iter()
            .find(|(_, idx)| **idx == index)
            .map(|(k, _)| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let mut map = NamespaceMap::new();
        let a = map.add_namespace("urn:test");
        let b = map.add_namespace("urn:test");
        assert_eq!(a, b);
        assert_eq!(a, 1);
        assert_eq!(map.get_index(constants::CORE_NAMESPACE), Some(0));
    }
}
