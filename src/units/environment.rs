//! Environment feature unit — probes the host platform.

use serde_json::json;
use tracing::debug;

use crate::facade::SUPPORTED_OS;
use crate::loader::contract::{UnitDefinition, entry, init_hook};

pub const NAME: &str = "environment";

pub fn definition() -> UnitDefinition {
    UnitDefinition::new(entry(|_args| async move {
        let os = std::env::consts::OS;
        let mut issues: Vec<String> = Vec::new();
        if std::env::var_os("HOME").is_none() && std::env::var_os("USERPROFILE").is_none() {
            issues.push("no home directory variable set".to_string());
        }
        if std::env::var_os("PATH").is_none() {
            issues.push("PATH is not set".to_string());
        }
        Ok(json!({
            "os": os,
            "arch": std::env::consts::ARCH,
            "family": std::env::consts::FAMILY,
            "supported": SUPPORTED_OS.contains(&os),
            "issues": issues,
            "source": "unit",
        }))
    }))
    .with_initialize(init_hook(|options| async move {
        debug!(?options, "environment unit initialised");
        Ok(())
    }))
    .with_metadata(json!({
        "name": NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Probes the host operating system and architecture",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::FeatureUnit;
    use serde_json::Value;

    #[tokio::test]
    async fn probes_current_platform() {
        let unit = FeatureUnit::validate(NAME, definition()).unwrap();
        unit.run_initialize(Value::Null).await.unwrap();
        let value = unit.invoke(Vec::new()).await.unwrap();
        assert_eq!(value["os"], std::env::consts::OS);
        assert_eq!(value["arch"], std::env::consts::ARCH);
        assert!(value["issues"].is_array());
    }
}
