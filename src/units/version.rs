//! Version feature unit — resolves the package name and version.

use serde_json::json;

use crate::loader::contract::{UnitDefinition, entry};

pub const NAME: &str = "version";

pub fn definition() -> UnitDefinition {
    UnitDefinition::new(entry(|_args| async move {
        Ok(json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "source": "unit",
        }))
    }))
    .with_metadata(json!({
        "name": NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Resolves the package name and version",
    }))
}
