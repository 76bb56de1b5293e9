//! Help feature unit — renders capability help text.

use serde_json::json;
use tracing::debug;

use crate::facade::CAPABILITIES;
use crate::loader::contract::{UnitDefinition, entry, teardown_hook};

pub const NAME: &str = "help";

pub fn definition() -> UnitDefinition {
    UnitDefinition::new(entry(|_args| async move {
        let mut text = format!(
            "{} {} — {}\n\ncapabilities:\n",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_DESCRIPTION"),
        );
        let mut names = Vec::new();
        for cap in CAPABILITIES {
            text.push_str(&format!(
                "  {:<22} backed by unit '{}'\n",
                cap.name, cap.unit
            ));
            names.push(cap.name);
        }
        text.push_str("\nRun `tessera help` for command usage.\n");
        Ok(json!({
            "text": text,
            "capabilities": names,
            "source": "unit",
        }))
    }))
    .with_teardown(teardown_hook(|| async move {
        debug!("help unit torn down");
        Ok(())
    }))
    .with_metadata(json!({
        "name": NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Renders help text for the available capabilities",
    }))
}
