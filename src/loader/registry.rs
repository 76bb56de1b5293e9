//! Unit registry — the loader's discovery surface.
//!
//! Discovery is a name → factory map resolved at startup rather than
//! filesystem introspection, so the set of discoverable units is explicit
//! and identical on every platform. A factory produces a fresh
//! [`UnitDefinition`] each call; the loader validates and caches the result.

use std::collections::HashMap;

use super::contract::UnitDefinition;

/// Produces a candidate definition for one unit name.
pub type UnitFactory = Box<dyn Fn() -> UnitDefinition + Send + Sync>;

#[derive(Default)]
pub struct UnitRegistry {
    factories: HashMap<String, UnitFactory>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, factory: UnitFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// All discoverable unit names, sorted for stable output.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run the factory for `name`. `None` when the name is not registered.
    pub(crate) fn instantiate(&self, name: &str) -> Option<UnitDefinition> {
        self.factories.get(name).map(|factory| factory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::contract::entry;
    use serde_json::Value;

    fn noop_definition() -> UnitDefinition {
        UnitDefinition::new(entry(|_args| async move { Ok(Value::Null) }))
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = UnitRegistry::new();
        registry.register("zeta", Box::new(noop_definition));
        registry.register("alpha", Box::new(noop_definition));
        assert_eq!(registry.names(), ["alpha", "zeta"]);
    }

    #[test]
    fn instantiate_unknown_is_none() {
        let registry = UnitRegistry::new();
        assert!(registry.instantiate("ghost").is_none());
        assert!(!registry.contains("ghost"));
    }

    #[test]
    fn re_registration_replaces() {
        let mut registry = UnitRegistry::new();
        registry.register("dup", Box::new(noop_definition));
        registry.register("dup", Box::new(UnitDefinition::default));
        let def = registry.instantiate("dup").unwrap();
        assert!(def.entry.is_none());
        assert_eq!(registry.names().len(), 1);
    }
}
