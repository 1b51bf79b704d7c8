//! Legacy dotted-code table.
//!
//! The forward direction (old -> new) is authoritative. The reverse direction
//! exists only for rendering legacy-style UIs and is derived by inversion, so
//! construction refuses any table where two old codes share a target.

use std::collections::HashMap;

use crate::catalog::LEGACY_PERMISSION_MAP;
use crate::error::RbacError;

#[derive(Debug, Clone, Default)]
pub struct LegacyMap {
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
    /// Old codes in table order.
    order: Vec<String>,
}

impl LegacyMap {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self, RbacError> {
        let mut map = Self::default();
        for (old, new) in entries {
            if map.forward.contains_key(old) {
                return Err(RbacError::DuplicateLegacyCode(old.to_string()));
            }
            if let Some(first) = map.reverse.get(new) {
                return Err(RbacError::ReverseMapCollision {
                    new_code: new.to_string(),
                    first: first.clone(),
                    second: old.to_string(),
                });
            }
            map.forward.insert(old.to_string(), new.to_string());
            map.reverse.insert(new.to_string(), old.to_string());
            map.order.push(old.to_string());
        }
        Ok(map)
    }

    /// The panel's built-in table.
    pub fn builtin() -> Result<Self, RbacError> {
        Self::new(LEGACY_PERMISSION_MAP.iter().copied())
    }

    /// New code for an old one.
    pub fn to_new(&self, legacy: &str) -> Option<&str> {
        self.forward.get(legacy).map(String::as_str)
    }

    /// Old code for a new one, for display only.
    pub fn to_legacy(&self, code: &str) -> Option<&str> {
        self.reverse.get(code).map(String::as_str)
    }

    /// `(old, new)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .map(|old| (old.as_str(), self.forward[old].as_str()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
