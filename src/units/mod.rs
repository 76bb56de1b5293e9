//! Shipped feature units — thin payloads registered into the unit registry.
//!
//! Each module exposes `NAME` and a `definition()` factory; the loader
//! validates the definition against the unit contract before caching it.
//! Business logic stays deliberately small — the interesting behaviour lives
//! in the loader and facade, not here.

pub mod environment;
pub mod help;
pub mod report;
pub mod version;

use crate::loader::UnitRegistry;

/// Register every shipped feature unit.
pub fn register_units(registry: &mut UnitRegistry) {
    registry.register(version::NAME, Box::new(version::definition));
    registry.register(environment::NAME, Box::new(environment::definition));
    registry.register(help::NAME, Box::new(help::definition));
    registry.register(report::NAME, Box::new(report::definition));
}

/// A registry pre-populated with the shipped units.
pub fn default_registry() -> UnitRegistry {
    let mut registry = UnitRegistry::new();
    register_units(&mut registry);
    registry
}
