//! Report feature unit — composes a diagnostic report from its dependencies.
//!
//! Declares `version` and `environment` as dependencies and receives the
//! resolved instances through the injection hook, so it exercises the
//! loader's full `load_with_dependencies` path.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;

use crate::loader::FeatureUnit;
use crate::loader::contract::{UnitDefinition, entry};

pub const NAME: &str = "report";

pub fn definition() -> UnitDefinition {
    let injected: Arc<Mutex<Vec<Arc<FeatureUnit>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&injected);

    UnitDefinition::new(entry(move |_args| {
        let injected = Arc::clone(&injected);
        async move {
            let deps: Vec<Arc<FeatureUnit>> = {
                let held = injected.lock().unwrap_or_else(|p| p.into_inner());
                held.clone()
            };

            let mut sections = Vec::new();
            for dep in deps {
                match dep.invoke(Vec::new()).await {
                    Ok(body) => sections.push(json!({ "title": dep.name(), "body": body })),
                    Err(e) => sections.push(json!({ "title": dep.name(), "error": e.to_string() })),
                }
            }

            Ok(json!({
                "generated_at": Utc::now().to_rfc3339(),
                "sections": sections,
                "source": "unit",
            }))
        }
    }))
    .with_dependencies(&["version", "environment"])
    .with_inject(move |deps| {
        *sink.lock().unwrap_or_else(|p| p.into_inner()) = deps;
    })
    .with_metadata(json!({
        "name": NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Renders a diagnostic report from the version and environment units",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LoaderConfig, ModuleLoader};
    use crate::units;
    use serde_json::Value;

    #[tokio::test]
    async fn report_sections_come_from_dependencies() {
        let loader = ModuleLoader::new(units::default_registry(), LoaderConfig::default());
        let result = loader
            .load_with_dependencies(NAME, Value::Null)
            .await
            .unwrap();
        let unit = result.unit().expect("report should load");

        let value = unit.invoke(Vec::new()).await.unwrap();
        let sections = value["sections"].as_array().unwrap();
        assert_eq!(sections.len(), 2);
        let titles: Vec<&str> = sections
            .iter()
            .map(|s| s["title"].as_str().unwrap())
            .collect();
        assert!(titles.contains(&"version"));
        assert!(titles.contains(&"environment"));
    }

    #[tokio::test]
    async fn without_injection_report_is_empty_but_valid() {
        // Loaded directly (no dependency resolution) the report still honours
        // its result schema.
        let unit = FeatureUnit::validate(NAME, definition()).unwrap();
        let value = unit.invoke(Vec::new()).await.unwrap();
        assert!(value["sections"].as_array().unwrap().is_empty());
        assert!(value["generated_at"].is_string());
    }
}
